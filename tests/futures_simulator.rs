use superselect::dfs::{dfs, DfsError};
use superselect::futures::utils::yield_now;
use superselect::futures::{Controller, Executor, Simulator, Spawner};

#[test]
fn minimal_simulation() {
    struct MyTest;
    impl Controller for MyTest {
        fn on_restart(&mut self, _: &Spawner) {}
        fn on_end_of_trajectory(&mut self, _: &Executor) {}
    }

    let sim = Simulator::new(MyTest);
    assert_eq!(Ok(1), dfs(&sim, None));
}

#[test]
fn detects_livelock() {
    struct MyTest;
    impl Controller for MyTest {
        fn on_restart(&mut self, spawner: &Spawner) {
            spawner.spawn_detach(async move {
                loop {
                    yield_now().await;
                }
            });
        }
        fn on_end_of_trajectory(&mut self, _: &Executor) {}
    }

    let sim = Simulator::new(MyTest);
    assert_eq!(Err(DfsError::MaxDepthExceeded(100)), dfs(&sim, Some(100)));
}

#[test]
fn transitions_are_reported() {
    #[derive(Default)]
    struct MyTest {
        steps: Vec<usize>,
    }
    impl Controller for MyTest {
        fn on_restart(&mut self, spawner: &Spawner) {
            self.steps.clear();
            spawner.spawn_detach(async {});
            spawner.spawn_detach(async {});
        }
        fn on_transition(&mut self, task: usize) {
            self.steps.push(task);
        }
        fn on_end_of_trajectory(&mut self, _: &Executor) {
            assert_eq!(2, self.steps.len());
        }
    }

    let sim = Simulator::new(MyTest::default());
    assert_eq!(Ok(2), dfs(&sim, None));
    assert_eq!(vec![1, 0], sim.into_controller().steps);
}

/// The number of trajectories equals the multinomial coefficient
///
///    factorial(polls per task * tasks) / factorial(polls per task)**tasks
///
/// where a task that yields `y` times is polled `y + 1` times.
#[test]
fn all_trajectories_equals_multinomial_coefficient() {
    let cases = [
        (0, 0),
        (1, 0),
        (1, 3),
        (2, 1),
        (2, 2),
        (2, 4),
        (3, 0),
        (3, 1),
        (3, 2),
    ];
    for (tasks, yields) in cases {
        #[derive(Default)]
        struct MyTest {
            tasks: u64,
            yields: u64,
            trajectories: u64,
        }
        impl Controller for MyTest {
            fn on_restart(&mut self, spawner: &Spawner) {
                for _ in 0..self.tasks {
                    let y = self.yields;
                    spawner.spawn_detach(async move {
                        for _ in 0..y {
                            yield_now().await;
                        }
                    });
                }
            }
            fn on_end_of_trajectory(&mut self, ex: &Executor) {
                assert_eq!(0, ex.unfinished_tasks());
                self.trajectories += 1;
            }
        }

        let sim = Simulator::new(MyTest {
            tasks,
            yields,
            ..Default::default()
        });
        let n = dfs(&sim, None).unwrap();
        let got = sim.into_controller().trajectories;

        let polls = yields + 1;
        let want = factorial(polls * tasks) / factorial(polls).pow(tasks as u32);
        assert_eq!(want, got, "tasks={tasks} yields={yields}");
        assert_eq!(want as usize, n);
    }
}

fn factorial(n: u64) -> u64 {
    (1..=n).product()
}

#[test]
fn factorial_check() {
    assert_eq!(1, factorial(0));
    assert_eq!(1, factorial(1));
    assert_eq!(6, factorial(3));
    assert_eq!(24, factorial(4));
}
