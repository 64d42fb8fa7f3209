#[macro_use]
mod common;

use common::TestResult;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use upframe::{
    BlockInfo, CallInfo, Flow, FrameKind, FrameStack, GuardInfo, Handle, Scope, ScopeError, Unwind,
    Value, Values, Want, origin, values,
};

fn unwind_from_nested_blocks(stack: &mut FrameStack) -> Flow<Values> {
    stack.block(BlockInfo::default(), origin!(), |stack| {
        stack.block(BlockInfo::default(), origin!(), |stack| {
            stack.unwind(None, values![1, 2, 3])
        })
    })?;
    Ok(values!["fell through"])
}

check_scenario!(
    test_unwind_scalar_context,
    want = Want::Scalar,
    body = unwind_from_nested_blocks,
    result = TestResult::SuccessWithValue(values![3])
);

check_scenario!(
    test_unwind_list_context,
    want = Want::List,
    body = unwind_from_nested_blocks,
    result = TestResult::SuccessWithValue(values![1, 2, 3])
);

check_scenario!(
    test_unwind_void_context,
    want = Want::Void,
    body = unwind_from_nested_blocks,
    result = TestResult::Success
);

check_scenario!(
    test_normal_return,
    want = Want::List,
    body = |_| Ok(values!["plain", "return"]),
    result = TestResult::SuccessWithValue(values!["plain", "return"])
);

check_scenario!(
    test_uncaught_failure,
    want = Want::List,
    body = |stack| {
        stack.block(BlockInfo::default(), origin!(), |_| {
            Err(Unwind::raise("disk on fire"))
        })
    },
    result = TestResult::Error("disk on fire".to_string())
);

check_scenario!(
    test_unwind_through_guarded_scope,
    want = Want::List,
    body = |stack| {
        let caught = stack.guarded(GuardInfo::new(Want::Scalar), origin!(), |stack| {
            stack.unwind(None, values!["escaped"])
        })?;
        Ok(values![format!("caught {caught:?}")])
    },
    result = TestResult::SuccessWithValue(values!["escaped"])
);

check_scenario!(
    test_leave_substitution_fails,
    want = Want::List,
    body = |stack| {
        stack.block(BlockInfo::substitution(), origin!(), |stack| {
            stack.leave(stack.capture(), values![1])
        })
    },
    result = TestResult::ErrorRegex(r"^Cannot leave: .*substitution.*".to_string())
);

check_scenario!(
    test_stale_handle_in_transfer,
    want = Want::List,
    body = |stack| {
        let stale = stack.block(BlockInfo::default(), origin!(), |stack| {
            Ok(values![stack.capture()])
        })?;
        let stale = stale[0].as_handle().unwrap();
        stack.leave(stale, values![])
    },
    result = TestResult::ErrorRegex(r"^Context \d+:\d+ has expired: frame has already been popped$".to_string())
);

check_scenario!(
    test_guarded_catches_raise,
    want = Want::List,
    body = |stack| {
        let caught = stack.guarded(GuardInfo::default(), origin!(), |stack| {
            stack.block(BlockInfo::default(), origin!(), |_| Err(Unwind::raise("inner")))
        })?;
        match caught {
            Err(error) => Ok(values![error.to_string()]),
            Ok(_) => Err(Unwind::raise("failure was not caught")),
        }
    },
    result = TestResult::SuccessWithValue(values!["inner"])
);

check_scenario!(
    test_uplevel_transparency,
    want = Want::Scalar,
    body = |stack| {
        let target = stack.capture();
        let results = stack.block(BlockInfo::default(), origin!(), |stack| {
            stack.call(CallInfo::new("main::helper", Want::Scalar), origin!(), |stack| {
                stack.block(BlockInfo::default(), origin!(), |stack| {
                    stack.uplevel(target, values!["a", "b"], |_, mut args| {
                        args.push(Value::Int(2));
                        Ok(args)
                    })
                })
            })
        })?;
        // uplevel hands back the full list; the scalar helper keeps the last value.
        Ok(values![Value::List(results.to_vec())])
    },
    result = TestResult::SuccessWithValue(values![Value::List(vec![Value::Int(2)])])
);

#[test]
fn test_uplevel_delivers_exact_results() {
    let mut stack = FrameStack::new();
    let mut delivered = None;
    stack
        .call(CallInfo::new("main::target", Want::Void), origin!(), |stack| {
            let target = stack.capture();
            stack.block(BlockInfo::default(), origin!(), |stack| {
                stack.block(BlockInfo::default(), origin!(), |stack| {
                    let results = stack.uplevel(target, values![10, 20], |_, mut args| {
                        args.push(Value::Int(2));
                        Ok(args)
                    })?;
                    delivered = Some(results);
                    Ok(values![])
                })
            })
        })
        .unwrap();
    assert_eq!(delivered, Some(values![10, 20, 2]));
}

/// Pushes Block -> Call -> Guarded -> Block and checks navigation from the
/// innermost block.
#[test]
fn test_navigation_scenario() {
    let mut stack = FrameStack::new();
    let mut innermost = None;
    stack
        .block(BlockInfo::default(), origin!(), |stack| {
            stack.call(CallInfo::new("main::f", Want::List), origin!(), |stack| {
                let call = stack.capture();
                stack
                    .guarded(GuardInfo::new(Want::Scalar), origin!(), |stack| {
                        let guard = stack.capture();
                        stack.block(BlockInfo::default(), origin!(), |stack| {
                            let b = stack.capture();
                            assert_eq!(stack.up(b, 1)?, guard);
                            assert_eq!(stack.up(b, 2)?, call);
                            assert_eq!(stack.enclosing_call(b, 0)?, call);
                            assert_eq!(stack.enclosing_guarded(b, 0)?, guard);
                            assert_eq!(stack.kind(stack.up(b, 2)?)?, FrameKind::Call);
                            innermost = Some(b);
                            Ok(values![])
                        })
                    })?
                    .map_err(Unwind::Failure)
            })
        })
        .unwrap();

    let b = innermost.unwrap();
    assert!(!stack.is_valid(b));
}

#[test]
fn test_stale_handle_property() {
    let mut stack = FrameStack::new();
    let cell = Rc::new(RefCell::new(0));
    let map = Rc::new(RefCell::new(HashMap::from([("k".to_string(), 1)])));
    let id = stack.push(Scope::Call(CallInfo::new("main::gone", Want::List)), origin!());
    let h = stack.handle_of(id).unwrap();
    stack.pop(id).unwrap();

    let expired = |result: Result<(), ScopeError>| {
        assert!(
            matches!(result, Err(ScopeError::ExpiredContext { .. })),
            "expected expired context, got {result:?}"
        );
    };
    assert!(!stack.is_valid(h));
    expired(stack.assert_valid(h));
    expired(stack.kind(h).map(drop));
    expired(stack.origin(h).map(drop));
    expired(stack.evaluation_context(h).map(drop));
    expired(stack.routine(h).map(drop));
    expired(stack.has_args(h).map(drop));
    expired(stack.source_text(h).map(drop));
    expired(stack.is_module_load(h).map(drop));
    expired(stack.frame_info(h).map(drop));
    expired(stack.up(h, 0).map(drop));
    expired(stack.enclosing_call(h, 0).map(drop));
    expired(stack.enclosing_guarded(h, 0).map(drop));
    expired(stack.on_exit(h, |_| Ok(())));
    expired(stack.localize(h, &cell, 5));
    expired(stack.localize_element(h, &map, "k".to_string(), 2));
    expired(stack.localize_delete(h, &map, "k".to_string()));

    let transfer_failure = |result: Flow<Values>| match result {
        Err(Unwind::Failure(error)) => expired(Err(error)),
        other => panic!("expected expired context, got {other:?}"),
    };
    transfer_failure(stack.unwind(h, values![]));
    transfer_failure(stack.leave(h, values![]));
    transfer_failure(stack.uplevel(h, values![], |_, args| Ok(args)));

    // Failed registrations must not have touched their targets.
    assert_eq!(*cell.borrow(), 0);
    assert_eq!(map.borrow().get("k"), Some(&1));
}

#[test]
fn test_generation_uniqueness() {
    let mut stack = FrameStack::new();
    let mut seen: HashSet<Handle> = HashSet::new();
    let mut uids = HashSet::new();
    assert!(seen.insert(stack.root()));

    for round in 0..50 {
        let mut ids = Vec::new();
        for _ in 0..(round % 5 + 1) {
            let id = stack.push(Scope::Block(BlockInfo::default()), origin!());
            let h = stack.handle_of(id).unwrap();
            assert!(seen.insert(h), "handle {h} reused");
            assert!(uids.insert(h.uid()));
            ids.push(id);
        }
        for id in ids.into_iter().rev() {
            stack.pop(id).unwrap();
        }
    }

    let live: Vec<_> = seen.iter().filter(|h| stack.is_valid(**h)).collect();
    assert_eq!(live, vec![&stack.root()]);
}

#[test]
fn test_deferred_ordering() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut stack = FrameStack::new();
    stack
        .block(BlockInfo::default(), origin!(), |stack| {
            let here = stack.capture();
            for action in ["A1", "A2", "A3"] {
                let log = Rc::clone(&log);
                stack.on_exit(here, move |_| {
                    log.borrow_mut().push(action);
                    Ok(())
                })?;
            }
            assert!(log.borrow().is_empty());
            Ok(values![])
        })
        .unwrap();
    assert_eq!(*log.borrow(), vec!["A1", "A2", "A3"]);
}

#[test]
fn test_deferred_action_runs_once_after_transfer() {
    let count = Rc::new(RefCell::new(0));
    let mut stack = FrameStack::new();
    let result = stack.call(CallInfo::new("main::f", Want::Scalar), origin!(), |stack| {
        let call = stack.capture();
        let count = Rc::clone(&count);
        stack.block(BlockInfo::default(), origin!(), |stack| {
            stack.on_exit(call, move |_| {
                *count.borrow_mut() += 1;
                Ok(())
            })?;
            stack.unwind(call, values!["out"])
        })
    });
    assert_eq!(result, Ok(values!["out"]));
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn test_exit_action_can_use_the_stack() {
    let seen = Rc::new(RefCell::new(None));
    let mut stack = FrameStack::new();
    stack
        .call(CallInfo::new("main::outer", Want::Void), origin!(), |stack| {
            stack.block(BlockInfo::default(), origin!(), |stack| {
                let seen = Rc::clone(&seen);
                stack.on_exit(stack.capture(), move |stack| {
                    // Runs after the block popped, with the call frame on top.
                    let routine = stack.routine(stack.capture())?;
                    let nested = stack.block(BlockInfo::default(), origin!(), |_| Ok(values![1]));
                    *seen.borrow_mut() = Some((routine, nested.is_ok()));
                    Ok(())
                })?;
                Ok(values![])
            })
        })
        .unwrap();
    assert_eq!(
        *seen.borrow(),
        Some((Some("main::outer".to_string()), true))
    );
}

#[test]
fn test_localize_restore() {
    let v = Rc::new(RefCell::new(Value::from("original")));
    let mut stack = FrameStack::new();
    stack
        .block(BlockInfo::default(), origin!(), |stack| {
            let h = stack.capture();
            stack.localize(h, &v, Value::from("new"))?;
            assert_eq!(*v.borrow(), Value::from("new"));
            Ok(values![])
        })
        .unwrap();
    assert_eq!(*v.borrow(), Value::from("original"));
}

#[test]
fn test_localize_twice_on_one_frame() {
    let v = Rc::new(RefCell::new(1));
    let mut stack = FrameStack::new();
    stack
        .block(BlockInfo::default(), origin!(), |stack| {
            let h = stack.capture();
            stack.localize(h, &v, 2)?;
            stack.localize(h, &v, 3)?;
            assert_eq!(*v.borrow(), 3);
            Ok(values![])
        })
        .unwrap();
    assert_eq!(*v.borrow(), 1);
}

#[test]
fn test_localize_element_twice_on_one_frame() {
    let array = Rc::new(RefCell::new(vec![1, 2, 3]));
    let env = Rc::new(RefCell::new(HashMap::from([("PATH", "/usr/bin")])));
    let mut stack = FrameStack::new();
    stack
        .block(BlockInfo::default(), origin!(), |stack| {
            let h = stack.capture();
            stack.localize_element(h, &array, 4, 40)?;
            stack.localize_element(h, &array, 4, 50)?;
            stack.localize_element(h, &array, 0, 10)?;
            stack.localize_delete(h, &array, 0)?;
            stack.localize_element(h, &env, "PATH", "/tmp")?;
            stack.localize_delete(h, &env, "PATH")?;
            assert_eq!(*array.borrow(), vec![0, 2, 3, 0, 50]);
            assert!(env.borrow().is_empty());
            Ok(values![])
        })
        .unwrap();
    assert_eq!(*array.borrow(), vec![1, 2, 3]);
    assert_eq!(*env.borrow(), HashMap::from([("PATH", "/usr/bin")]));
}

#[test]
fn test_localize_again_on_inner_frame_restores_in_turn() {
    let v = Rc::new(RefCell::new(1));
    let mut stack = FrameStack::new();
    stack
        .block(BlockInfo::default(), origin!(), |stack| {
            let outer = stack.capture();
            stack.localize(outer, &v, 2)?;
            stack.block(BlockInfo::default(), origin!(), |stack| {
                let inner = stack.capture();
                stack.localize(inner, &v, 3)?;
                Ok(values![])
            })?;
            assert_eq!(*v.borrow(), 2);
            Ok(values![])
        })
        .unwrap();
    assert_eq!(*v.borrow(), 1);
}

#[test]
fn test_localize_outlives_inner_scope() {
    let v = Rc::new(RefCell::new(0));
    let mut stack = FrameStack::new();
    stack
        .call(CallInfo::new("main::outer", Want::Void), origin!(), |stack| {
            let outer = stack.capture();
            let v_inner = Rc::clone(&v);
            stack.call(CallInfo::new("main::inner", Want::Void), origin!(), move |stack| {
                stack.localize(outer, &v_inner, 42)?;
                Ok(values![])
            })?;
            assert_eq!(*v.borrow(), 42);
            Ok(values![])
        })
        .unwrap();
    assert_eq!(*v.borrow(), 0);
}

#[test]
fn test_localize_elements() {
    let array = Rc::new(RefCell::new(vec![1, 2, 3]));
    let tree = Rc::new(RefCell::new(BTreeMap::from([("a", 1), ("b", 2)])));
    let mut stack = FrameStack::new();
    stack
        .block(BlockInfo::default(), origin!(), |stack| {
            let h = stack.capture();
            stack.localize_element(h, &array, 1, 20)?;
            stack.localize_element(h, &array, 4, 50)?;
            stack.localize_delete(h, &tree, "a")?;
            stack.localize_delete(h, &tree, "missing")?;
            stack.localize_element(h, &tree, "c", 3)?;
            assert_eq!(*array.borrow(), vec![1, 20, 3, 0, 50]);
            assert_eq!(tree.borrow().keys().copied().collect::<Vec<_>>(), vec!["b", "c"]);
            Ok(values![])
        })
        .unwrap();
    assert_eq!(*array.borrow(), vec![1, 2, 3]);
    assert_eq!(*tree.borrow(), BTreeMap::from([("a", 1), ("b", 2)]));
}

#[test]
fn test_handle_comparison() {
    let stack = FrameStack::new();
    let root = stack.root();
    assert_eq!(root, stack.capture());
    assert_eq!(root.equals(&Value::from(stack.capture())), Ok(true));
    assert_eq!(
        root.equals(&Value::from("root")),
        Err(ScopeError::InvalidComparison { found: "string" })
    );
}

#[test]
fn test_separate_stacks_do_not_share_handles() {
    let first = FrameStack::new();
    let second = FrameStack::new();
    assert!(!second.is_valid(first.root()));
    assert_ne!(first.root(), second.root());
}

#[test]
fn test_frame_info_and_backtrace() {
    let mut stack = FrameStack::new();
    let info = GuardInfo {
        source: Some("require Foo".to_string()),
        module_load: true,
        want: Want::Scalar,
    };
    stack
        .guarded(info, origin!(), |stack| {
            let h = stack.capture();
            let described = stack.frame_info(h)?;
            assert_eq!(described.kind(), FrameKind::Guarded);
            assert_eq!(described.id, h.frame_id());
            assert_eq!(described.origin.namespace, module_path!());
            let trace: Vec<String> = stack.backtrace().iter().map(ToString::to_string).collect();
            assert_eq!(trace.len(), 2);
            assert!(trace[0].starts_with("#1 guarded (scalar) from"), "{}", trace[0]);
            Ok(values![])
        })
        .unwrap()
        .unwrap();
}
