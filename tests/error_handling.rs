mod common;

use statekit::{reduce, EffectSource, StateContainer, UpdateSource};

use common::{entries, event_log, push, Counter, CounterAction, EventLog};

fn counting_reduce_with_handlers(log: &EventLog) -> statekit::Reduce<CounterAction, Counter> {
    let first = log.clone();
    let second = log.clone();
    reduce(|r| {
        r.catch(move |failure| push(&first, format!("first:{}", failure.origin)));
        r.catch(move |failure| push(&second, format!("second:{}", failure.origin)));
        r.try_transition(|src: &UpdateSource<CounterAction, Counter>| match &src.action {
            CounterAction::Increment => Ok(Counter::new(src.state.value + 1)),
            CounterAction::Add(amount) => Ok(Counter::new(src.state.value + amount)),
            CounterAction::Boom => anyhow::bail!("transition exploded"),
        });
    })
}

#[tokio::test]
async fn both_handlers_see_a_transition_failure_once() {
    let log = event_log();
    let container = StateContainer::new(Counter::new(0), counting_reduce_with_handlers(&log));

    container.dispatch(CounterAction::Boom).wait().await;

    assert_eq!(entries(&log), vec!["first:transition", "second:transition"]);
    // Commit skipped: state unchanged.
    assert_eq!(container.state().value, 0);
}

#[tokio::test]
async fn container_stays_usable_after_a_transition_failure() {
    let log = event_log();
    let container = StateContainer::new(Counter::new(0), counting_reduce_with_handlers(&log));

    container.dispatch(CounterAction::Boom).wait().await;
    container.dispatch(CounterAction::Increment).wait().await;
    container.dispatch(CounterAction::Add(5)).wait().await;

    assert_eq!(container.state().value, 6);
    assert_eq!(entries(&log).len(), 2);
}

#[tokio::test]
async fn failing_effect_reaches_every_handler_and_spares_siblings() {
    let log = event_log();
    let first = log.clone();
    let second = log.clone();
    let sibling = log.clone();
    let r = reduce(|r| {
        r.catch(move |failure| push(&first, format!("first:{}", failure.origin)));
        r.catch(move |failure| push(&second, format!("second:{}", failure.origin)));
        r.transition(|src: &UpdateSource<CounterAction, Counter>| {
            Counter::new(src.state.value + 1)
        });
        r.try_effect(|_src| anyhow::bail!("effect exploded"));
        r.effect(move |_src| push(&sibling, "sibling"));
    });
    let container = StateContainer::new(Counter::new(0), r);

    container.dispatch(CounterAction::Increment).wait().await;

    assert_eq!(
        entries(&log),
        vec!["first:effect", "second:effect", "sibling"]
    );
    // The transition committed even though an effect failed.
    assert_eq!(container.state().value, 1);
}

#[tokio::test]
async fn async_effect_failure_is_routed() {
    let log = event_log();
    let handler_log = log.clone();
    let r = reduce(|r| {
        r.catch(move |failure| push(&handler_log, format!("handler:{}", failure.origin)));
        r.try_suspend_effect(|_src: std::sync::Arc<EffectSource<CounterAction, Counter>>| {
            async move { anyhow::bail!("async exploded") }
        });
    });
    let container = StateContainer::new(Counter::new(0), r);

    container.dispatch(CounterAction::Increment).wait().await;

    assert_eq!(entries(&log), vec!["handler:async effect"]);
}

#[tokio::test]
async fn panicking_async_effect_is_routed() {
    let log = event_log();
    let handler_log = log.clone();
    let r = reduce(|r| {
        r.catch(move |failure| push(&handler_log, format!("handler:{}", failure.origin)));
        r.suspend_effect(|_src: std::sync::Arc<EffectSource<CounterAction, Counter>>| {
            async move { panic!("task exploded") }
        });
    });
    let container = StateContainer::new(Counter::new(0), r);

    container.dispatch(CounterAction::Increment).wait().await;

    assert_eq!(entries(&log), vec!["handler:async effect"]);
}

#[tokio::test]
async fn failure_inside_child_scope_spares_ancestor_siblings() {
    let log = event_log();
    let handler_log = log.clone();
    let after = log.clone();
    let r = reduce(|r| {
        r.catch(move |failure| push(&handler_log, format!("handler:{}", failure.origin)));
        r.group(|child| {
            child.try_effect(|_src: &EffectSource<CounterAction, Counter>| {
                anyhow::bail!("child exploded")
            });
        });
        r.effect(move |_src| push(&after, "ancestor sibling"));
    });
    let container = StateContainer::new(Counter::new(0), r);

    container.dispatch(CounterAction::Increment).wait().await;

    assert_eq!(entries(&log), vec!["handler:effect", "ancestor sibling"]);
}
