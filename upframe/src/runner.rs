use anyhow::{Result, bail, ensure};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};
use upframe::{
    BlockInfo, CallInfo, FrameKind, FrameStack, GuardInfo, ScopeError, Value, Want, origin, values,
};

/// A named demonstration run against a fresh frame stack.
pub struct Scenario {
    pub name: &'static str,
    pub about: &'static str,
    run: fn() -> Result<()>,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "navigate",
        about: "Walk from a nested block to its enclosing call and guarded frames",
        run: navigate,
    },
    Scenario {
        name: "deferred",
        about: "Run exit actions in registration order",
        run: deferred,
    },
    Scenario {
        name: "localize",
        about: "Overlay a variable and a hash element until a caller returns",
        run: localize,
    },
    Scenario {
        name: "unwind",
        about: "Return from a call through nested blocks and guarded scopes",
        run: unwind,
    },
    Scenario {
        name: "uplevel",
        about: "Run a callback as the body of an enclosing call",
        run: uplevel,
    },
];

/// Runs the named scenarios (all of them when `names` is empty) and returns
/// how many ran.
pub fn run(names: &[String]) -> Result<usize> {
    let selected: Vec<&Scenario> = if names.is_empty() {
        SCENARIOS.iter().collect()
    } else {
        names
            .iter()
            .map(|name| {
                SCENARIOS
                    .iter()
                    .find(|s| s.name == name)
                    .ok_or_else(|| anyhow::anyhow!("Unknown scenario '{}'", name))
            })
            .collect::<Result<_>>()?
    };

    for scenario in &selected {
        info!("Running scenario: {}", scenario.name);
        (scenario.run)().map_err(|e| e.context(format!("scenario '{}'", scenario.name)))?;
        println!("✓ {}", scenario.name);
    }
    Ok(selected.len())
}

fn navigate() -> Result<()> {
    let mut stack = FrameStack::new();
    let mut innermost = None;
    stack.block(BlockInfo::default(), origin!(), |stack| {
        stack.call(CallInfo::new("main::outer", Want::List), origin!(), |stack| {
            let call = stack.capture();
            stack.guarded(GuardInfo::new(Want::Scalar), origin!(), |stack| {
                let guard = stack.capture();
                stack.block(BlockInfo::default(), origin!(), |stack| {
                    let here = stack.capture();
                    for frame in stack.backtrace() {
                        println!("    {frame}");
                    }
                    ensure_in_flow(stack.up(here, 1)? == guard)?;
                    ensure_in_flow(stack.up(here, 2)? == call)?;
                    ensure_in_flow(stack.enclosing_call(here, 0)? == call)?;
                    ensure_in_flow(stack.enclosing_guarded(here, 0)? == guard)?;
                    innermost = Some(here);
                    Ok(values![])
                })
            })?
            .map_err(upframe::Unwind::Failure)
        })
    })?;

    let Some(innermost) = innermost else {
        bail!("Innermost block never ran");
    };
    ensure!(!stack.is_valid(innermost), "Handle should expire with its frame");
    match stack.kind(innermost) {
        Err(ScopeError::ExpiredContext { .. }) => Ok(()),
        other => bail!("Expected an expired context, got {:?}", other),
    }
}

fn deferred() -> Result<()> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut stack = FrameStack::new();
    stack.block(BlockInfo::default(), origin!(), |stack| {
        let here = stack.capture();
        for name in ["first", "second", "third"] {
            let log = Rc::clone(&log);
            stack.on_exit(here, move |_| {
                log.borrow_mut().push(name);
                Ok(())
            })?;
        }
        Ok(values![])
    })?;
    debug!("Exit actions ran: {:?}", log.borrow());
    ensure!(*log.borrow() == ["first", "second", "third"], "Exit actions ran out of order");
    Ok(())
}

fn localize() -> Result<()> {
    let level = Rc::new(RefCell::new(Value::from("info")));
    let env = Rc::new(RefCell::new(HashMap::from([(
        "PATH".to_string(),
        "/usr/bin".to_string(),
    )])));

    let mut stack = FrameStack::new();
    stack.call(CallInfo::new("main::configure", Want::Void), origin!(), |stack| {
        stack.call(CallInfo::new("main::helper", Want::Void), origin!(), |stack| {
            // Overlay the caller's frame, so the values outlive this helper.
            let caller = stack.enclosing_call(None, 1)?;
            stack.localize(caller, &level, Value::from("trace"))?;
            stack.localize_element(caller, &env, "HOME".to_string(), "/tmp".to_string())?;
            stack.localize_delete(caller, &env, "PATH".to_string())?;
            Ok(values![])
        })?;
        println!("    inside configure: level={} env={:?}", level.borrow(), env.borrow());
        ensure_in_flow(*level.borrow() == Value::from("trace"))?;
        ensure_in_flow(!env.borrow().contains_key("PATH"))?;
        Ok(values![])
    })?;

    println!("    after configure: level={} env={:?}", level.borrow(), env.borrow());
    ensure!(*level.borrow() == Value::from("info"), "Level was not restored");
    ensure!(env.borrow().get("PATH").map(String::as_str) == Some("/usr/bin"));
    ensure!(!env.borrow().contains_key("HOME"), "Overlay element leaked");
    Ok(())
}

fn unwind() -> Result<()> {
    let mut stack = FrameStack::new();
    for want in [Want::Void, Want::Scalar, Want::List] {
        let result = stack.call(CallInfo::new("main::search", want), origin!(), |stack| {
            stack.guarded(GuardInfo::default(), origin!(), |stack| {
                stack.block(BlockInfo::default(), origin!(), |stack| {
                    stack.unwind(None, values![1, 2, 3])
                })
            })??;
            Ok(values!["fell through"])
        })?;
        println!("    {want} context received {:?}", result.as_slice());
        ensure!(result == want.deliver(values![1, 2, 3]));
    }
    Ok(())
}

fn uplevel() -> Result<()> {
    let mut stack = FrameStack::new();
    let result = stack.call(CallInfo::new("main::target", Want::Scalar), origin!(), |stack| {
        let target = stack.capture();
        let seen = stack.block(BlockInfo::default(), origin!(), |stack| {
            stack.call(CallInfo::new("main::helper", Want::List), origin!(), |stack| {
                stack.uplevel(target, values!["arg"], |stack, mut args| {
                    let here = stack.capture();
                    println!(
                        "    callback sees {} in {:?} context",
                        stack.routine(here)?.unwrap_or_default(),
                        stack.evaluation_context(here)?
                    );
                    ensure_in_flow(stack.kind(here)? == FrameKind::Call)?;
                    args.push(Value::Int(2));
                    Ok(args)
                })
            })
        })?;
        ensure_in_flow(seen == values!["arg", 2])?;
        Ok(values!["target result"])
    })?;
    ensure!(result == values!["target result"]);
    Ok(())
}

/// Checks a condition from inside a frame body.
fn ensure_in_flow(condition: bool) -> upframe::Flow<()> {
    if condition {
        Ok(())
    } else {
        Err(upframe::Unwind::raise("scenario check failed"))
    }
}
