//! Integration Tests for Reactive System
//!
//! These tests verify that signals, computeds, effects and scopes work
//! together correctly through the public API only.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use ripple_core::{
    create_computed, create_effect, create_effect_with_cleanup, create_signal, on_cleanup,
    run_batched, run_untracked, with_root, Computed, Effect, NodeKind, ReactiveError,
    Runtime, RuntimeConfig, Signal,
};

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

/// Effect that reads every signal in `deps` and counts its runs.
fn watch(deps: &[&Signal<i32>]) -> (Effect, Rc<Cell<usize>>) {
    let runs = counter();
    let deps: Vec<Signal<i32>> = deps.iter().map(|s| (*s).clone()).collect();
    let effect = {
        let runs = runs.clone();
        create_effect(move || {
            for dep in &deps {
                dep.read();
            }
            runs.set(runs.get() + 1);
        })
    };
    (effect, runs)
}

/// Writing the current value neither reruns effects nor dirties computeds.
#[test]
fn equal_writes_short_circuit() {
    let s = create_signal(3);
    let doubled = {
        let s = s.clone();
        create_computed(move || s.read() * 2)
    };
    assert_eq!(doubled.read(), 6);
    let (_effect, runs) = watch(&[&s]);

    s.write(3);
    assert_eq!(runs.get(), 1);
    assert!(!doubled.is_dirty());
}

/// The bottom of a diamond sees both branches updated and runs once.
#[test]
fn diamond_is_glitch_free() {
    let a = create_signal(1);
    let b = {
        let a = a.clone();
        create_computed(move || a.read() * 2)
    };
    let c = {
        let a = a.clone();
        create_computed(move || a.read() + 1)
    };
    let d_runs = counter();
    let d = {
        let (b, c, d_runs) = (b.clone(), c.clone(), d_runs.clone());
        create_computed(move || {
            d_runs.set(d_runs.get() + 1);
            b.read() + c.read()
        })
    };

    assert_eq!(d.read(), 4);
    a.write(5);
    assert_eq!(d.read(), 16);
    assert_eq!(d_runs.get(), 2);
}

/// An effect on top of a diamond never observes a half-updated state.
#[test]
fn effects_see_consistent_diamonds() {
    let a = create_signal(1);
    let b = {
        let a = a.clone();
        create_computed(move || a.read() * 2)
    };
    let c = {
        let a = a.clone();
        create_computed(move || a.read() + 1)
    };
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _effect = {
        let (a, b, c, seen) = (a.clone(), b.clone(), c.clone(), seen.clone());
        create_effect(move || seen.borrow_mut().push((a.read(), b.read(), c.read())))
    };

    a.write(5);
    assert_eq!(*seen.borrow(), vec![(1, 2, 2), (5, 10, 6)]);
}

#[test]
fn batches_coalesce_reruns() {
    let x = create_signal(0);
    let y = create_signal(0);

    let (_batched, batched_runs) = watch(&[&x, &y]);
    run_batched(|| {
        x.write(1);
        y.write(2);
    });
    assert_eq!(batched_runs.get(), 2);

    let (_unbatched, unbatched_runs) = watch(&[&x, &y]);
    x.write(10);
    y.write(20);
    assert_eq!(unbatched_runs.get(), 3);
}

#[test]
fn nested_batches_flush_once_at_the_outermost_level() {
    let x = create_signal(0);
    let (_effect, runs) = watch(&[&x]);

    run_batched(|| {
        x.write(1);
        run_batched(|| x.write(2));
        assert_eq!(runs.get(), 1);
        x.write(3);
    });
    assert_eq!(runs.get(), 2);
    assert!(Runtime::is_idle());
}

/// Switching branches tears down the edge to the branch no longer read.
#[test]
fn stale_edges_are_removed() {
    let cond = create_signal(true);
    let a = create_signal(0);
    let b = create_signal(0);
    let runs = counter();
    let _effect = {
        let (cond, a, b, runs) = (cond.clone(), a.clone(), b.clone(), runs.clone());
        create_effect(move || {
            runs.set(runs.get() + 1);
            if cond.read() {
                a.read();
            } else {
                b.read();
            }
        })
    };

    cond.write(false);
    assert_eq!(runs.get(), 2);

    a.write(1);
    assert_eq!(runs.get(), 2);

    b.write(1);
    assert_eq!(runs.get(), 3);
}

#[test]
fn disposed_effects_stay_inert() {
    for via_root in [false, true] {
        let s = create_signal(0);
        let runs = counter();
        let cleanups = counter();

        let (root, effect) = with_root(|root| {
            let (s, runs, cleanups) = (s.clone(), runs.clone(), cleanups.clone());
            let effect = create_effect_with_cleanup(move || {
                s.read();
                runs.set(runs.get() + 1);
                let cleanups = cleanups.clone();
                move || cleanups.set(cleanups.get() + 1)
            });
            (root, effect)
        });

        s.write(1);
        assert_eq!((runs.get(), cleanups.get()), (2, 1));

        if via_root {
            root.dispose();
        } else {
            effect.dispose();
        }
        assert_eq!(cleanups.get(), 2);

        s.write(2);
        effect.dispose();
        root.dispose();
        assert_eq!((runs.get(), cleanups.get()), (2, 2));
        assert_eq!(s.subscriber_count(), 0);
    }
}

#[test]
fn untracked_reads_do_not_subscribe() {
    let z = create_signal(0);
    let runs = counter();
    let _effect = {
        let (z, runs) = (z.clone(), runs.clone());
        create_effect(move || {
            runs.set(runs.get() + 1);
            run_untracked(|| z.read());
        })
    };

    z.write(1);
    z.write(2);
    assert_eq!(runs.get(), 1);
    assert_eq!(z.subscriber_count(), 0);
}

#[test]
fn computeds_are_lazy() {
    let s = create_signal(0);
    let derives = counter();
    let computed = {
        let (s, derives) = (s.clone(), derives.clone());
        create_computed(move || {
            derives.set(derives.get() + 1);
            s.read()
        })
    };
    assert_eq!(derives.get(), 0);

    assert_eq!(computed.read(), 0);
    assert_eq!(derives.get(), 1);

    for n in 1..=10 {
        s.write(n);
    }
    assert_eq!(derives.get(), 1);

    assert_eq!(computed.read(), 10);
    assert_eq!(derives.get(), 2);
}

#[test]
fn same_value_write_logs_once() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let c = create_signal(0);
    let _eff = {
        let (c, log) = (c.clone(), log.clone());
        create_effect(move || log.borrow_mut().push(c.read()))
    };

    c.write(0);
    assert_eq!(*log.borrow(), vec![0]);
}

#[test]
#[should_panic(expected = "cyclic dependency")]
fn self_writing_effect_fails_fast() {
    let s = create_signal(0);
    let _effect = {
        let s = s.clone();
        create_effect(move || s.write(s.read() + 1))
    };
}

#[test]
fn self_writing_effect_leaves_the_runtime_usable() {
    let s = create_signal(0);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let s = s.clone();
        create_effect(move || s.write(s.read() + 1))
    }));

    assert!(result.is_err());
    assert!(Runtime::is_idle());
    assert_eq!(s.subscriber_count(), 0);

    // The write that triggered the cycle did land
    assert_eq!(s.peek(), 1);
    s.write(5);
    assert_eq!(s.peek(), 5);
}

#[test]
fn cycle_found_during_a_flush_goes_to_the_error_handler() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    {
        let errors = errors.clone();
        Runtime::configure(
            RuntimeConfig::new().with_error_handler(move |err| errors.borrow_mut().push(err.clone())),
        );
    }

    let trigger = create_signal(false);
    let s = create_signal(0);
    let _effect = {
        let (trigger, s) = (trigger.clone(), s.clone());
        create_effect(move || {
            if trigger.read() {
                s.write(s.read() + 1);
            }
        })
    };

    trigger.write(true);
    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ReactiveError::EffectPanicked { message, .. } => {
            assert!(message.starts_with("cyclic dependency: effect"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn computed_reading_itself_reports_a_cycle() {
    let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let computed = {
        let (slot, errors) = (slot.clone(), errors.clone());
        create_computed(move || {
            let me = slot.borrow().clone();
            if let Some(Err(err)) = me.map(|me| me.try_read()) {
                errors.borrow_mut().push(err);
            }
            1
        })
    };
    *slot.borrow_mut() = Some(computed.clone());

    assert_eq!(computed.read(), 1);
    assert_eq!(
        *errors.borrow(),
        vec![ReactiveError::Cycle {
            node: computed.id(),
            kind: NodeKind::Derived,
        }]
    );
    slot.borrow_mut().take();
}

#[test]
fn one_failing_effect_does_not_starve_its_siblings() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    {
        let errors = errors.clone();
        Runtime::configure(
            RuntimeConfig::new().with_error_handler(move |err| errors.borrow_mut().push(err.clone())),
        );
    }

    let s = create_signal(0);
    let failing = {
        let s = s.clone();
        create_effect(move || {
            if s.read() == 1 {
                panic!("cannot handle one");
            }
        })
    };
    let (_sibling, sibling_runs) = watch(&[&s]);

    s.write(1);
    assert_eq!(sibling_runs.get(), 2);
    assert_eq!(
        *errors.borrow(),
        vec![ReactiveError::EffectPanicked {
            node: failing.id(),
            message: "cannot handle one".to_string(),
        }]
    );

    // The failed effect kept its dependencies and recovers on the next write
    s.write(2);
    assert_eq!(failing.run_count(), 3);
    assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn effect_that_failed_behind_a_computed_runs_again() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    {
        let errors = errors.clone();
        Runtime::configure(
            RuntimeConfig::new().with_error_handler(move |err| errors.borrow_mut().push(err.clone())),
        );
    }

    let s = create_signal(0);
    let c = {
        let s = s.clone();
        create_computed(move || s.read())
    };
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _effect = {
        let (c, seen) = (c.clone(), seen.clone());
        create_effect(move || {
            let value = c.read();
            if value == 1 {
                panic!("cannot handle one");
            }
            seen.borrow_mut().push(value);
        })
    };

    s.write(1);
    s.write(2);
    s.write(3);

    assert_eq!(*seen.borrow(), vec![0, 2, 3]);
    assert_eq!(errors.borrow().len(), 1);
    assert!(matches!(
        errors.borrow()[0],
        ReactiveError::EffectPanicked { .. }
    ));
}

#[test]
fn effect_panics_propagate_without_a_handler() {
    let s = create_signal(0);
    let _effect = {
        let s = s.clone();
        create_effect(move || {
            if s.read() > 0 {
                panic!("effect exploded");
            }
        })
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| s.write(1)));
    let payload = result.expect_err("the write should panic");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"effect exploded"));
    assert!(Runtime::is_idle());
}

#[test]
fn runaway_flushes_are_cut_off() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    {
        let errors = errors.clone();
        Runtime::configure(
            RuntimeConfig::new()
                .with_max_flush_runs(50)
                .with_error_handler(move |err| errors.borrow_mut().push(err.clone())),
        );
    }

    let ping = create_signal(0);
    let pong = create_signal(0);
    let _forward = {
        let (ping, pong) = (ping.clone(), pong.clone());
        create_effect(move || pong.write(ping.read() + 1))
    };
    let _backward = {
        let (ping, pong) = (ping.clone(), pong.clone());
        create_effect(move || ping.write(pong.read() + 1))
    };

    assert_eq!(
        *errors.borrow(),
        vec![ReactiveError::RunawayFlush { limit: 50 }]
    );
    assert_eq!(Runtime::pending_effects(), 0);
}

/// A write made by an effect is handled after that effect returns, in the
/// same flush.
#[test]
fn writes_from_effects_join_the_current_flush() {
    let source = create_signal(0);
    let mirror = create_signal(0);
    let events = Rc::new(RefCell::new(Vec::new()));

    let _copy = {
        let (source, mirror, events) = (source.clone(), mirror.clone(), events.clone());
        create_effect(move || {
            mirror.write(source.read() * 10);
            events.borrow_mut().push("copy");
        })
    };
    let _show = {
        let (mirror, events) = (mirror.clone(), events.clone());
        create_effect(move || {
            mirror.read();
            events.borrow_mut().push("show");
        })
    };
    events.borrow_mut().clear();

    source.write(1);
    assert_eq!(*events.borrow(), vec!["copy", "show"]);
    assert_eq!(mirror.peek(), 10);
}

#[test]
fn effects_run_in_creation_order() {
    let s = create_signal(0);
    let order = Rc::new(RefCell::new(Vec::new()));
    let _effects: Vec<Effect> = (0..4)
        .map(|i| {
            let (s, order) = (s.clone(), order.clone());
            create_effect(move || {
                s.read();
                order.borrow_mut().push(i);
            })
        })
        .collect();
    order.borrow_mut().clear();

    s.write(1);
    assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
}

#[test]
fn disposal_runs_cleanups_last_in_first_out() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let push = {
        let order = order.clone();
        move |label: &'static str| {
            let order = order.clone();
            move || order.borrow_mut().push(label)
        }
    };

    let root = with_root(|root| {
        on_cleanup(push("root 1"));
        let _effect = create_effect_with_cleanup({
            let push = push.clone();
            move || push("effect")
        });
        with_root(|_| on_cleanup(push("inner")));
        on_cleanup(push("root 2"));
        root
    });

    root.dispose();
    assert_eq!(*order.borrow(), vec!["inner", "effect", "root 2", "root 1"]);
}

#[test]
fn cleanup_writes_are_batched() {
    let a = create_signal(0);
    let b = create_signal(0);
    let (_effect, runs) = watch(&[&a, &b]);

    let root = with_root(|root| {
        let (a, b) = (a.clone(), b.clone());
        on_cleanup(move || {
            a.write(1);
            b.write(1);
        });
        root
    });

    root.dispose();
    assert_eq!(runs.get(), 2);
}

#[test]
fn snapshots_reflect_the_live_graph() {
    let (root, signal, computed) = with_root(|root| {
        let signal = create_signal(1);
        let computed = {
            let signal = signal.clone();
            create_computed(move || signal.read() + 1)
        };
        (root, signal, computed)
    });
    computed.read();

    let snapshot = Runtime::snapshot();
    assert!(snapshot.is_consistent());
    assert_eq!(snapshot.count(NodeKind::Source), 1);
    assert_eq!(snapshot.count(NodeKind::Derived), 1);
    assert_eq!(snapshot.node(signal.id()).unwrap().subscribers, vec![computed.id()]);
    assert_eq!(
        snapshot.node(root.id()).unwrap().owned,
        vec![signal.id(), computed.id()]
    );

    let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
    assert!(!snapshot.to_msgpack().unwrap().is_empty());

    root.dispose();
    assert_eq!(Runtime::node_count(), 0);
}

#[test]
fn custom_signal_equality_is_respected() {
    #[derive(Clone, Debug)]
    struct Reading {
        value: f64,
        taken_at: u64,
    }

    let reading = Signal::with_equality(
        Reading {
            value: 1.0,
            taken_at: 0,
        },
        |a: &Reading, b: &Reading| a.value == b.value,
    );
    let runs = counter();
    let _effect = {
        let (reading, runs) = (reading.clone(), runs.clone());
        create_effect(move || {
            reading.with(|r| r.value);
            runs.set(runs.get() + 1);
        })
    };

    reading.write(Reading {
        value: 1.0,
        taken_at: 5,
    });
    assert_eq!(runs.get(), 1);
    assert_eq!(reading.peek().taken_at, 0);

    reading.update(|r| Reading {
        value: r.value + 1.0,
        taken_at: 6,
    });
    assert_eq!(runs.get(), 2);
}

/// An effect that only reads a computed skips its rerun when the computed
/// settles on the value it already had.
#[test]
fn effects_skip_reruns_when_computeds_settle_unchanged() {
    let n = create_signal(2);
    let is_even = {
        let n = n.clone();
        create_computed(move || n.read() % 2 == 0)
    };
    let runs = counter();
    let _effect = {
        let (is_even, runs) = (is_even.clone(), runs.clone());
        create_effect(move || {
            is_even.read();
            runs.set(runs.get() + 1);
        })
    };

    n.write(4);
    assert_eq!(runs.get(), 1);
    assert!(!is_even.is_dirty());

    n.write(5);
    assert_eq!(runs.get(), 2);
}
