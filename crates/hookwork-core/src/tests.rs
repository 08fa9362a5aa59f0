#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    use proptest::prelude::*;

    use crate::prelude::*;

    type Log = Rc<RefCell<Vec<String>>>;

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn counter() -> Rc<Cell<u32>> {
        Rc::new(Cell::new(0))
    }

    /// One pass with a single `use_effect`, recording runs and cleanups.
    fn render_effect(engine: &mut Engine, id: InstanceId, deps: Deps, runs: &Log, tag: &str) {
        let mut pass = engine.begin_render(id).unwrap();
        let runs_in = runs.clone();
        let tag = tag.to_string();
        pass.use_effect(deps, move || {
            runs_in.borrow_mut().push(format!("run {tag}"));
            let runs_out = runs_in.clone();
            on_unmount(move || runs_out.borrow_mut().push(format!("cleanup {tag}")))
        })
        .unwrap();
        pass.end_render().unwrap();
    }

    #[test]
    fn test_state_persists_by_position() {
        let mut engine = Engine::new();
        let id = engine.mount("state");

        let mut pass = engine.begin_render(id).unwrap();
        let (a, set_a) = pass.use_state(|| 1).unwrap();
        let (b, _) = pass.use_state(|| "b".to_string()).unwrap();
        pass.end_render().unwrap();
        assert_eq!((a, b.as_str()), (1, "b"));

        set_a.set(10);

        let mut pass = engine.begin_render(id).unwrap();
        let (a, _) = pass.use_state(|| 999).unwrap();
        let (b, _) = pass.use_state(|| "ignored".to_string()).unwrap();
        pass.end_render().unwrap();
        assert_eq!((a, b.as_str()), (10, "b"));
    }

    #[test]
    fn test_equal_writes_schedule_nothing() {
        let mut engine = Engine::new();
        let id = engine.mount("scenario");

        let mut pass = engine.begin_render(id).unwrap();
        let (value, set) = pass.use_state(|| 0).unwrap();
        pass.end_render().unwrap();
        assert_eq!(value, 0);

        assert!(set.set(1));
        assert!(!set.set(1));
        assert!(set.set(2));
        assert_eq!(engine.requests_for(id), 2);

        assert_eq!(engine.take_dirty(), vec![id]);
        let mut pass = engine.begin_render(id).unwrap();
        let (value, _) = pass.use_state(|| 0).unwrap();
        pass.end_render().unwrap();
        assert_eq!(value, 2);
        assert_eq!(engine.pending_requests(), 0);
    }

    #[test]
    fn test_writing_back_the_committed_value_is_a_noop() {
        let mut engine = Engine::new();
        let id = engine.mount("noop");

        let mut pass = engine.begin_render(id).unwrap();
        let (_, set) = pass.use_state(|| 5).unwrap();
        pass.end_render().unwrap();

        assert!(!set.set(5));
        assert!(!set.update(|v| *v));
        assert!(!engine.is_dirty(id));
    }

    #[test]
    fn test_update_closure_may_write_the_same_slot() {
        let mut engine = Engine::new();
        let id = engine.mount("nested");

        let mut pass = engine.begin_render(id).unwrap();
        let (_, set) = pass.use_state(|| 0).unwrap();
        pass.end_render().unwrap();

        let inner = set.clone();
        assert!(set.update(|v| {
            inner.set(7);
            *v + 1
        }));
        assert_eq!(engine.requests_for(id), 2);

        let mut pass = engine.begin_render(id).unwrap();
        let (value, _) = pass.use_state(|| 0).unwrap();
        pass.end_render().unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_pass_sees_snapshot_taken_at_begin() {
        let mut engine = Engine::new();
        let id = engine.mount("snapshot");

        let mut pass = engine.begin_render(id).unwrap();
        let (_, set_a) = pass.use_state(|| 0).unwrap();
        let (_, set_b) = pass.use_state(|| 0).unwrap();
        pass.end_render().unwrap();

        let mut pass = engine.begin_render(id).unwrap();
        let (a, _) = pass.use_state(|| 0).unwrap();
        // Write slot 1 before it is read in this pass.
        set_b.set(7);
        set_a.set(3);
        let (b, _) = pass.use_state(|| 0).unwrap();
        pass.end_render().unwrap();
        assert_eq!((a, b), (0, 0));

        let mut pass = engine.begin_render(id).unwrap();
        let (a, _) = pass.use_state(|| 0).unwrap();
        let (b, _) = pass.use_state(|| 0).unwrap();
        pass.end_render().unwrap();
        assert_eq!((a, b), (3, 7));
    }

    #[test]
    fn test_once_effect_runs_once_and_cleans_up_at_unmount() {
        let mut engine = Engine::new();
        let id = engine.mount("once");
        let runs = log();

        for _ in 0..5 {
            render_effect(&mut engine, id, deps![], &runs, "mount");
        }
        assert_eq!(*runs.borrow(), vec!["run mount"]);

        engine.unmount(id).unwrap();
        assert_eq!(*runs.borrow(), vec!["run mount", "cleanup mount"]);
    }

    #[test]
    fn test_effect_reruns_only_when_deps_change() {
        let mut engine = Engine::new();
        let id = engine.mount("deps");
        let runs = log();

        for x in [1, 1, 2, 2, 3] {
            render_effect(&mut engine, id, deps![x], &runs, &x.to_string());
        }
        assert_eq!(
            *runs.borrow(),
            vec!["run 1", "cleanup 1", "run 2", "cleanup 2", "run 3"]
        );

        engine.unmount(id).unwrap();
        assert_eq!(runs.borrow().last().unwrap(), "cleanup 3");
    }

    #[test]
    fn test_always_effect_runs_every_pass() {
        let mut engine = Engine::new();
        let id = engine.mount("always");
        let runs = log();

        for i in 0..3 {
            render_effect(&mut engine, id, Deps::Always, &runs, &i.to_string());
        }
        assert_eq!(
            *runs.borrow(),
            vec!["run 0", "cleanup 0", "run 1", "cleanup 1", "run 2"]
        );
    }

    #[test]
    fn test_effects_run_after_render_in_slot_order() {
        let mut engine = Engine::new();
        let id = engine.mount("order");
        let events = log();

        let mut pass = engine.begin_render(id).unwrap();
        for name in ["first", "second", "third"] {
            let events = events.clone();
            pass.use_effect(deps![], move || events.borrow_mut().push(name.to_string()))
                .unwrap();
        }
        events.borrow_mut().push("rendered".to_string());
        pass.end_render().unwrap();

        assert_eq!(
            *events.borrow(),
            vec!["rendered", "first", "second", "third"]
        );
    }

    #[test]
    fn test_unmount_cleans_up_in_slot_order_exactly_once() {
        let mut engine = Engine::new();
        let id = engine.mount("teardown");
        let events = log();

        let mut pass = engine.begin_render(id).unwrap();
        pass.use_state(|| 0u8).unwrap();
        for name in ["a", "b", "c"] {
            let events = events.clone();
            pass.use_effect(deps![], move || {
                on_unmount(move || events.borrow_mut().push(name.to_string()))
            })
            .unwrap();
        }
        // No cleanup for this one.
        pass.use_effect(deps![], || ()).unwrap();
        pass.end_render().unwrap();

        engine.unmount(id).unwrap();
        assert_eq!(*events.borrow(), vec!["a", "b", "c"]);

        assert!(matches!(
            engine.unmount(id),
            Err(HookError::UnknownInstance(_))
        ));
        assert_eq!(events.borrow().len(), 3);
    }

    #[test]
    fn test_setter_after_unmount_is_ignored() {
        let mut engine = Engine::new();
        let id = engine.mount("late");

        let mut pass = engine.begin_render(id).unwrap();
        let (_, set) = pass.use_state(|| 0).unwrap();
        pass.end_render().unwrap();

        engine.unmount(id).unwrap();
        assert!(!set.is_live());
        assert!(!set.set(42));
        assert_eq!(engine.pending_requests(), 0);
        assert!(engine.take_dirty().is_empty());
    }

    #[test]
    fn test_extra_hook_is_an_order_violation() {
        let mut engine = Engine::new();
        let id = engine.mount("grow");

        let mut pass = engine.begin_render(id).unwrap();
        pass.use_state(|| 0).unwrap();
        pass.end_render().unwrap();

        let mut pass = engine.begin_render(id).unwrap();
        pass.use_state(|| 0).unwrap();
        let err = pass.use_state(|| 0).unwrap_err();
        assert!(matches!(
            err,
            HookError::HookOrderViolation {
                violation: OrderViolation::TooManyHooks {
                    slot: 1,
                    expected: 1
                },
                ..
            }
        ));
        drop(pass);

        assert_eq!(engine.slot_count(id), Some(1));
        assert!(matches!(
            engine.begin_render(id),
            Err(HookError::Poisoned(_))
        ));
    }

    #[test]
    fn test_missing_hook_is_an_order_violation() {
        let mut engine = Engine::new();
        let id = engine.mount("shrink");
        let runs = log();

        let mut pass = engine.begin_render(id).unwrap();
        pass.use_state(|| 0).unwrap();
        let runs_in = runs.clone();
        pass.use_effect(deps![], move || {
            on_unmount(move || runs_in.borrow_mut().push("cleanup".into()))
        })
        .unwrap();
        pass.end_render().unwrap();

        let mut pass = engine.begin_render(id).unwrap();
        pass.use_state(|| 0).unwrap();
        let err = pass.end_render().unwrap_err();
        assert!(matches!(
            err,
            HookError::HookOrderViolation {
                violation: OrderViolation::TooFewHooks {
                    expected: 2,
                    found: 1
                },
                ..
            }
        ));

        // A halted instance still releases its resources.
        engine.unmount(id).unwrap();
        assert_eq!(*runs.borrow(), vec!["cleanup"]);
    }

    #[test]
    fn test_kind_and_type_changes_are_order_violations() {
        let mut engine = Engine::new();
        let kind = engine.mount("kind");
        let ty = engine.mount("type");

        for id in [kind, ty] {
            let mut pass = engine.begin_render(id).unwrap();
            pass.use_state(|| 0i32).unwrap();
            pass.end_render().unwrap();
        }

        let mut pass = engine.begin_render(kind).unwrap();
        let err = pass.use_effect(Deps::Always, || ()).unwrap_err();
        assert!(matches!(
            err,
            HookError::HookOrderViolation {
                violation: OrderViolation::KindChanged {
                    slot: 0,
                    expected: SlotKind::State,
                    found: SlotKind::Effect
                },
                ..
            }
        ));
        drop(pass);

        let mut pass = engine.begin_render(ty).unwrap();
        let err = pass.use_state(|| "text").unwrap_err();
        assert!(err.is_order_violation());
        drop(pass);
    }

    #[test]
    fn test_effect_error_propagates_and_cleanup_still_runs() {
        let mut engine = Engine::new();
        let id = engine.mount("failing");
        let runs = log();

        let attempt = |engine: &mut Engine, x: u32, fail: bool| {
            let mut pass = engine.begin_render(id).unwrap();
            let first = runs.clone();
            pass.use_effect(deps![x], move || -> anyhow::Result<Dispose> {
                first.borrow_mut().push(format!("run {x}"));
                if fail {
                    anyhow::bail!("effect {x} failed");
                }
                let first = first.clone();
                Ok(on_unmount(move || first.borrow_mut().push(format!("cleanup {x}"))))
            })
            .unwrap();
            let second = runs.clone();
            pass.use_effect(deps![x], move || second.borrow_mut().push(format!("second {x}")))
                .unwrap();
            pass.end_render()
        };

        attempt(&mut engine, 1, false).unwrap();
        let err = attempt(&mut engine, 2, true).unwrap_err();
        assert!(matches!(err, HookError::Effect { slot: 0, .. }));
        // Not retried while deps stay the same; the skipped effect catches up.
        attempt(&mut engine, 2, false).unwrap();
        attempt(&mut engine, 3, false).unwrap();
        engine.unmount(id).unwrap();

        assert_eq!(
            *runs.borrow(),
            vec![
                "run 1",
                "second 1",
                "cleanup 1",
                "run 2",
                "second 2",
                "run 3",
                "second 3",
                "cleanup 3",
            ]
        );
    }

    #[test]
    fn test_abandoned_pass_reevaluates_effects() {
        let mut engine = Engine::new();
        let id = engine.mount("abandoned");
        let runs = counter();

        {
            let mut pass = engine.begin_render(id).unwrap();
            let runs = runs.clone();
            pass.use_effect(deps![], move || runs.set(runs.get() + 1))
                .unwrap();
            // Dropped without end_render.
        }
        assert_eq!(runs.get(), 0);

        let mut pass = engine.begin_render(id).unwrap();
        let runs_in = runs.clone();
        pass.use_effect(deps![], move || runs_in.set(runs_in.get() + 1))
            .unwrap();
        pass.end_render().unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_subscription_is_cancelled_on_unmount() {
        let mut engine = Engine::new();
        let id = engine.mount("ticker");
        let clock = Rc::new(ManualClock::new());
        let ticker = Ticker::new(clock.clone(), Duration::from_millis(100));

        let render = |engine: &mut Engine| {
            let mut pass = engine.begin_render(id).unwrap();
            let ticks = pass.use_subscription(ticker.clone(), || 0).unwrap();
            pass.end_render().unwrap();
            ticks
        };

        assert_eq!(render(&mut engine), 0);
        clock.advance(Duration::from_millis(250));
        ticker.poll();
        assert_eq!(engine.requests_for(id), 2);
        engine.take_dirty();
        assert_eq!(render(&mut engine), 2);

        engine.unmount(id).unwrap();
        assert!(ticker.is_idle());
        clock.advance(Duration::from_secs(1));
        assert_eq!(ticker.poll(), 0);
        assert_eq!(engine.pending_requests(), 0);
    }

    #[test]
    fn test_signal_drives_text_state() {
        let mut engine = Engine::new();
        let id = engine.mount("text");
        let text = signal(String::new());

        let render = |engine: &mut Engine| {
            let mut pass = engine.begin_render(id).unwrap();
            let value = pass.use_subscription(text.clone(), String::new).unwrap();
            pass.end_render().unwrap();
            value
        };

        render(&mut engine);
        text.set("hi".to_string());
        text.set("hi".to_string());
        assert_eq!(engine.requests_for(id), 1);
        assert_eq!(render(&mut engine), "hi");

        engine.unmount(id).unwrap();
        assert_eq!(text.subscriber_count(), 0);
    }

    struct Countdown {
        ticker: Ticker,
    }

    impl Component for Countdown {
        type Output = u32;

        fn render(&self, hooks: &mut RenderPass<'_>) -> Result<u32, HookError> {
            let (left, set_left) = hooks.use_state(|| 3u32)?;
            let ticker = self.ticker.clone();
            hooks.use_effect(deps![left > 0], move || {
                (left > 0).then(|| {
                    ticker.subscribe(Box::new(move |_: u64| {
                        set_left.update(|l| l.saturating_sub(1));
                    }))
                })
            })?;
            Ok(left)
        }
    }

    #[test]
    fn test_host_settles_and_countdown_stops_at_zero() {
        let clock = Rc::new(ManualClock::new());
        let ticker = Ticker::new(clock.clone(), Duration::from_millis(10));
        let mut host = Host::mount(
            Countdown {
                ticker: ticker.clone(),
            },
            EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(host.output(), Some(&3));

        for _ in 0..5 {
            clock.advance(Duration::from_millis(10));
            ticker.poll();
            host.settle().unwrap();
        }
        assert_eq!(host.output(), Some(&0));
        assert!(ticker.is_idle());

        assert_eq!(host.unmount().unwrap(), Some(0));
    }

    struct Runaway;

    impl Component for Runaway {
        type Output = ();

        fn render(&self, hooks: &mut RenderPass<'_>) -> Result<(), HookError> {
            let (n, set_n) = hooks.use_state(|| 0u64)?;
            hooks.use_effect(Deps::Always, move || {
                set_n.set(n + 1);
            })?;
            Ok(())
        }
    }

    #[test]
    fn test_host_reports_render_loops() {
        let err = Host::mount(Runaway, EngineConfig::default().max_settle_passes(4))
            .err()
            .unwrap();
        assert!(matches!(err, HookError::RenderLoop { passes: 4, .. }));
    }

    #[test]
    fn test_engine_drop_runs_cleanups() {
        let cleaned = counter();
        {
            let mut engine = Engine::new();
            for name in ["x", "y"] {
                let id = engine.mount(name);
                let mut pass = engine.begin_render(id).unwrap();
                let cleaned = cleaned.clone();
                pass.use_effect(deps![], move || {
                    on_unmount(move || cleaned.set(cleaned.get() + 1))
                })
                .unwrap();
                pass.end_render().unwrap();
            }
        }
        assert_eq!(cleaned.get(), 2);
    }

    proptest! {
        #[test]
        fn prop_equal_writes_never_schedule(writes in proptest::collection::vec(0u8..4, 0..32)) {
            let mut engine = Engine::new();
            let id = engine.mount("prop");
            let mut pass = engine.begin_render(id).unwrap();
            let (_, set) = pass.use_state(|| 0u8).unwrap();
            pass.end_render().unwrap();

            let mut latest = 0u8;
            let mut expected = 0;
            for w in writes {
                let scheduled = set.set(w);
                prop_assert_eq!(scheduled, w != latest);
                if scheduled {
                    expected += 1;
                }
                latest = w;
            }
            prop_assert_eq!(engine.requests_for(id), expected);
        }

        #[test]
        fn prop_effect_runs_iff_a_position_changes(
            frames in proptest::collection::vec((0u8..3, 0u8..3), 1..16)
        ) {
            let mut engine = Engine::new();
            let id = engine.mount("prop");
            let runs = log();

            for (a, b) in &frames {
                render_effect(&mut engine, id, deps![*a, *b], &runs, "e");
            }

            let expected_runs = 1 + frames.windows(2).filter(|w| w[0] != w[1]).count();
            let actual_runs = runs.borrow().iter().filter(|e| e.starts_with("run")).count();
            prop_assert_eq!(actual_runs, expected_runs);

            // Every re-run was preceded by the previous cleanup.
            let cleanups = runs.borrow().iter().filter(|e| e.starts_with("cleanup")).count();
            prop_assert_eq!(cleanups, expected_runs - 1);
        }
    }
}
