use racetrack_core::geometry::{crash, distance_to_finish};
use racetrack_core::{
    choose_velocity, ChooserConfig, Edge, Frontier, HeuristicGrid, Point, RaceContext, State,
    Velocity,
};

fn edge(x1: i32, y1: i32, x2: i32, y2: i32) -> Edge {
    Edge::new(Point::new(x1, y1), Point::new(x2, y2))
}

fn boxed(width: i32, height: i32) -> Vec<Edge> {
    vec![
        edge(0, 0, width, 0),
        edge(width, 0, width, height),
        edge(width, height, 0, height),
        edge(0, height, 0, 0),
    ]
}

#[derive(Debug, PartialEq)]
enum Finish {
    Won { turns: usize },
    Crashed { turn: usize },
    OutOfTurns,
}

/// Drives the chooser against a motionless opponent, committing each turn's
/// frontier entries the way the harness does.
fn drive(race: &RaceContext, start: Point, max_turns: usize) -> (Finish, Vec<State>) {
    let grid = HeuristicGrid::build(race);
    let mut frontier = Frontier::new();
    let mut state = State::new(start, Velocity::ZERO);
    let mut trail = vec![state];
    for turn in 0..max_turns {
        if state.velocity.is_zero() && distance_to_finish(state.position, race.finish()) <= 1.0 {
            return (Finish::Won { turns: turn }, trail);
        }
        let decision = choose_velocity(
            race,
            &grid,
            &frontier,
            state,
            ChooserConfig::default(),
            &mut |_| {},
        );
        decision.commit(&mut frontier);
        let next = state.advance(decision.velocity);
        if crash(Edge::new(state.position, next.position), race.walls()) {
            return (Finish::Crashed { turn }, trail);
        }
        state = next;
        trail.push(state);
    }
    (Finish::OutOfTurns, trail)
}

#[test]
fn open_field_run_closes_in_and_stops() {
    let start = Point::new(5, 0);
    let race = RaceContext::new(edge(0, 0, 0, 2), vec![], Some(start)).unwrap();
    let (finish, trail) = drive(&race, start, 20);

    assert!(matches!(finish, Finish::Won { .. }), "{finish:?}");
    for pair in trail.windows(2) {
        assert!(pair[1].position.x <= pair[0].position.x, "{trail:?}");
    }
    let last = trail.last().unwrap();
    assert!(last.velocity.is_zero());
    assert!(distance_to_finish(last.position, race.finish()) <= 1.0);
}

#[test]
fn rounds_a_pillar() {
    let mut walls = boxed(24, 14);
    walls.push(edge(12, 4, 12, 10));
    let race = RaceContext::new(edge(20, 6, 20, 8), walls, None).unwrap();
    let (finish, _) = drive(&race, Point::new(3, 7), 60);
    assert!(matches!(finish, Finish::Won { .. }), "{finish:?}");
}

#[test]
fn escapes_a_hook() {
    let mut walls = boxed(24, 14);
    walls.push(edge(8, 0, 8, 9));
    let race = RaceContext::new(edge(3, 1, 3, 4), walls, None).unwrap();
    let (finish, _) = drive(&race, Point::new(16, 3), 60);
    assert!(matches!(finish, Finish::Won { .. }), "{finish:?}");
}

#[test]
fn frontier_only_grows_across_turns() {
    let mut walls = boxed(24, 14);
    walls.push(edge(12, 4, 12, 10));
    let race = RaceContext::new(edge(20, 6, 20, 8), walls, None).unwrap();
    let grid = HeuristicGrid::build(&race);
    let mut frontier = Frontier::new();
    let mut state = State::new(Point::new(3, 7), Velocity::ZERO);
    for _ in 0..5 {
        let before: Vec<_> = frontier.iter().copied().collect();
        let decision = choose_velocity(
            &race,
            &grid,
            &frontier,
            state,
            ChooserConfig::default(),
            &mut |_| {},
        );
        decision.commit(&mut frontier);
        assert!(before.iter().all(|e| frontier.contains(e)));
        assert!(decision.entries.iter().all(|e| frontier.contains(e)));
        state = state.advance(decision.velocity);
    }
}
