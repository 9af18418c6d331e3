//! Property-based tests for the bookgame core.
//!
//! Uses proptest to generate random signal and intent sequences, then
//! verifies the state invariants hold.

use bookgame_core::app::{App, EngineEvent};
use bookgame_core::config::AppConfig;
use bookgame_core::content::Content;
use bookgame_core::id::{ChapterId, ResourceId, TargetIndex};
use bookgame_core::mode::ModeEvent;
use bookgame_core::simulate::SimulatedScene;
use bookgame_core::state::{LoadStatus, Mode, Page};
use bookgame_core::store::Store;
use bookgame_core::test_utils::*;
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

// ===========================================================================
// Generators
// ===========================================================================

/// Indices 0..4 belong to the active chapter; 4 and 5 do not.
const CHAPTER_TARGETS: u32 = 4;

fn tracking_content() -> Content {
    let mut content = single_chapter_content();
    content.chapters[0].targets = (0..CHAPTER_TARGETS)
        .map(|i| target(&format!("t{i}"), i, None))
        .collect();
    content
}

#[derive(Debug, Clone)]
struct Signal {
    index: u32,
    found: bool,
    gap: u64,
}

fn arb_signals(max: usize) -> impl Strategy<Value = Vec<Signal>> {
    proptest::collection::vec(
        (0..6u32, any::<bool>(), 0..120u64).prop_map(|(index, found, gap)| Signal {
            index,
            found,
            gap,
        }),
        0..=max,
    )
}

#[derive(Debug, Clone)]
enum Intent {
    Mode(ModeEvent),
    Navigate(Page),
    Close,
}

fn arb_intents(max: usize) -> impl Strategy<Value = Vec<Intent>> {
    proptest::collection::vec(
        prop_oneof![
            proptest::sample::select(ModeEvent::ALL.to_vec()).prop_map(Intent::Mode),
            proptest::sample::select(Page::ALL.to_vec()).prop_map(Intent::Navigate),
            Just(Intent::Close),
        ],
        0..=max,
    )
}

fn started_app(content: Content, window: u64) -> (App, SimulatedScene) {
    let config = AppConfig {
        target_debounce_ms: window,
        ..AppConfig::default()
    };
    let mut app = App::new(content, config, Box::new(FakeCamera::granting())).unwrap();
    let mut scene = SimulatedScene::new();
    app.start().unwrap();
    scene.settle(&mut app);
    (app, scene)
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After settling, tracked targets are exactly the chapter indices whose
    /// most recent signal was "found".
    #[test]
    fn tracking_settles_to_last_signal(signals in arb_signals(60), window in 0..80u64) {
        let (mut app, _scene) = started_app(tracking_content(), window);

        let mut now = 1_000;
        let mut last: BTreeMap<u32, bool> = BTreeMap::new();
        for s in &signals {
            now += s.gap;
            let index = TargetIndex(s.index);
            let event = if s.found {
                EngineEvent::TargetFound { index, timestamp: now }
            } else {
                EngineEvent::TargetLost { index, timestamp: now }
            };
            app.handle(event);
            last.insert(s.index, s.found);
        }
        app.advance(now + window + 1);

        let mut tracked: Vec<u32> = app.state().tracked_targets.iter().map(|i| i.0).collect();
        tracked.sort_unstable();
        let expected: Vec<u32> = last
            .into_iter()
            .filter(|&(index, found)| found && index < CHAPTER_TARGETS)
            .map(|(index, _)| index)
            .collect();
        prop_assert_eq!(tracked, expected);
        prop_assert_eq!(app.targets().pending(), 0);
    }

    /// N updates invoke every subscriber N+1 times, in subscription order.
    #[test]
    fn subscribers_see_every_update(updates in 0..40usize, subscribers in 1..5usize) {
        let store = Store::new(0u32);
        let calls = Rc::new(RefCell::new(Vec::new()));
        for id in 0..subscribers {
            let calls = calls.clone();
            let _ = store.subscribe(move |_| calls.borrow_mut().push(id));
        }
        let replay: Vec<usize> = (0..subscribers).collect();
        prop_assert_eq!(&*calls.borrow(), &replay);

        for _ in 0..updates {
            store.update(|v| *v += 1);
        }

        let calls = calls.borrow();
        prop_assert_eq!(calls.len(), subscribers * (updates + 1));
        for round in calls[subscribers..].chunks(subscribers) {
            prop_assert_eq!(round, &replay[..]);
        }
    }

    /// A page overlay and QR scanning are never shown together.
    #[test]
    fn route_and_qr_are_exclusive(intents in arb_intents(40)) {
        let (app, _scene) = started_app(sample_content(), 50);
        for intent in intents {
            match intent {
                Intent::Mode(event) => { app.dispatch_mode(event); }
                Intent::Navigate(page) => { app.router().navigate(page, None); }
                Intent::Close => { app.router().close(); }
            }
            let state = app.state();
            prop_assert!(
                !(state.mode == Mode::Qr && state.current_route.is_some()),
                "route {:?} open in QR mode", state.current_route
            );
        }
    }

    /// Settled resource statuses never change, whatever the engine reports
    /// afterwards.
    #[test]
    fn resource_status_only_moves_forward(
        reports in proptest::collection::vec((0..3usize, any::<bool>()), 0..30)
    ) {
        let (mut app, _scene) = started_app(sample_content(), 50);
        app.switch_chapter(&ChapterId::from("c1")).unwrap();
        let _ = app.drain_commands();
        app.handle(EngineEvent::SceneLoaded);

        let ids = ["robot-model", "intro-video", "ghost"];
        let mut settled: BTreeMap<&str, LoadStatus> = BTreeMap::new();
        for (which, ok) in reports {
            let id = ResourceId::from(ids[which]);
            if ok {
                app.handle(EngineEvent::AssetLoaded { id });
            } else {
                app.handle(EngineEvent::AssetFailed { id, reason: "x".into() });
            }
            let state = app.state();
            for name in ids {
                let status = state.assets.get(&ResourceId::from(name)).map(|r| r.status);
                if let Some(previous) = settled.get(name) {
                    prop_assert_eq!(Some(*previous), status);
                } else if let Some(status) = status.filter(|s| s.is_settled()) {
                    settled.insert(name, status);
                }
            }
        }
    }
}
