mod common;

use statekit::{reduce, EffectSource, StateContainer, StatekitConfig};

use common::{entries, event_log, push, Counter, CounterAction};

#[tokio::test]
async fn config_fallback_handler_applies_when_reduce_declares_none() {
    let log = event_log();
    let handler_log = log.clone();
    let r = reduce(|r| {
        r.try_effect(|_src: &EffectSource<CounterAction, Counter>| {
            anyhow::bail!("effect exploded")
        });
    });
    let container = StateContainer::builder(Counter::new(0), r)
        .config(StatekitConfig::new().with_fallback_handler(move |failure| {
            push(&handler_log, format!("fallback:{}", failure.origin));
        }))
        .build();

    container.dispatch(CounterAction::Increment).wait().await;

    assert_eq!(entries(&log), vec!["fallback:effect"]);
}

#[tokio::test]
async fn reduce_handlers_take_precedence_over_the_fallback() {
    let log = event_log();
    let own = log.clone();
    let fallback = log.clone();
    let r = reduce(|r| {
        r.catch(move |failure| push(&own, format!("own:{}", failure.origin)));
        r.try_effect(|_src: &EffectSource<CounterAction, Counter>| {
            anyhow::bail!("effect exploded")
        });
    });
    let container = StateContainer::builder(Counter::new(0), r)
        .config(StatekitConfig::new().with_fallback_handler(move |failure| {
            push(&fallback, format!("fallback:{}", failure.origin));
        }))
        .build();

    container.dispatch(CounterAction::Increment).wait().await;

    assert_eq!(entries(&log), vec!["own:effect"]);
}

// Installs process-wide defaults; kept as the only test in this binary that
// touches the global slot so parallel test threads cannot race it.
#[tokio::test]
async fn installed_defaults_apply_to_unconfigured_containers() {
    let log = event_log();
    let handler_log = log.clone();
    statekit::install_defaults(StatekitConfig::new().with_fallback_handler(move |failure| {
        push(&handler_log, format!("default:{}", failure.origin));
    }));

    let r = reduce(|r| {
        r.try_effect(|_src: &EffectSource<CounterAction, Counter>| {
            anyhow::bail!("effect exploded")
        });
    });
    let container = StateContainer::new(Counter::new(0), r);

    container.dispatch(CounterAction::Increment).wait().await;

    assert_eq!(entries(&log), vec!["default:effect"]);
    statekit::clear_defaults();
}
