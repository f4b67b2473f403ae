// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod common;

use common::*;
use gpiomirror::dispatcher::{Builder, Dispatcher};
use gpiomirror::sim::{ManualClock, Sim};
use gpiomirror::{
    EdgeEvent, Error, ErrorKind, IoOp, LogicalLevel, Polarity, Provider, RawLevel, Status,
    StatusSink, Timestamp,
};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

fn changed(level: LogicalLevel, at: Duration) -> Status {
    Status::Changed(EdgeEvent {
        level,
        observed_at: Timestamp::from_duration(at),
    })
}

fn injected(op: IoOp, name: &str) -> Error {
    Error::Io(op, name.into(), "injected failure".into())
}

// A dispatcher on a manual clock, evaluated only by edges and polls.
fn manual(
    sim: &Arc<Sim>,
    clock: &ManualClock,
    output_polarity: Polarity,
) -> (Dispatcher<Sim>, Receiver<Status>) {
    let (button, led) = open_pins(sim, output_polarity);
    let (sink, rx) = channel();
    let d = Builder::new()
        .with_debounce_period(PERIOD)
        .with_clock(Arc::new(clock.clone()))
        .without_settle_timer()
        .build(sim.clone(), button, led, sink)
        .unwrap();
    (d, rx)
}

mod construction {
    use super::*;

    #[test]
    fn drives_output_to_initial_level() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);
        assert_eq!(d.level(), LogicalLevel::Deasserted);
        assert_eq!(d.debounce_period(), PERIOD);
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::Low]);
        assert_eq!(sim.subscriber_count(BUTTON), 1);
        // the initial level is not a change
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn initially_asserted() {
        let sim = sim();
        sim.pulldown(BUTTON).unwrap();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);
        assert_eq!(d.level(), LogicalLevel::Asserted);
        assert_eq!(sim.get_level(LED).unwrap(), RawLevel::High);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn active_low_output() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, _rx) = manual(&sim, &clock, Polarity::ActiveLow);
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::High]);

        sim.pulldown(BUTTON).unwrap();
        clock.set(PERIOD);
        d.poll();
        assert_eq!(d.level(), LogicalLevel::Asserted);
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::High, RawLevel::Low]);
    }

    #[test]
    fn initial_read_failure() {
        let sim = sim();
        sim.fail_reads(BUTTON, true).unwrap();
        let (button, led) = open_pins(&sim, Polarity::ActiveHigh);
        let (sink, rx) = channel();
        let e = Builder::new()
            .build(sim.clone(), button, led, sink)
            .err()
            .unwrap();
        assert_eq!(e.error(), &injected(IoOp::Read, BUTTON));
        assert!(sim.writes(LED).unwrap().is_empty());
        assert_eq!(sim.subscriber_count(BUTTON), 0);
        assert!(drain(&rx).is_empty());

        let (button, led) = e.into_pins();
        assert_eq!(button.name(), BUTTON);
        assert_eq!(led.name(), LED);
        sim.close(button).unwrap();
        sim.close(led).unwrap();
        assert!(!sim.is_claimed(BUTTON));
        assert!(!sim.is_claimed(LED));
    }

    #[test]
    fn initial_write_failure() {
        let sim = sim();
        sim.fail_writes(LED, true).unwrap();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);
        assert_eq!(
            drain(&rx),
            [Status::Failed(ErrorKind::Write, injected(IoOp::Write, LED))]
        );
        assert_eq!(d.level(), LogicalLevel::Deasserted);
        assert_eq!(sim.subscriber_count(BUTTON), 1);
    }

    #[test]
    fn invalid_pins() {
        let sim = sim();
        let (button, led) = open_pins(&sim, Polarity::ActiveHigh);
        let (sink, _rx) = channel();
        // swapped
        let e = Builder::new()
            .build(sim.clone(), led, button, sink)
            .err()
            .unwrap();
        assert_eq!(
            e.error(),
            &Error::InvalidArgument("pin \"LED\" is not an input".into())
        );
        assert_eq!(e.to_string(), "pin \"LED\" is not an input");
        let (led, button) = e.into_pins();
        assert!(sim.writes(LED).unwrap().is_empty());

        let (sink, _rx) = channel();
        let e = Builder::new()
            .with_debounce_period(Duration::ZERO)
            .build(sim.clone(), button, led, sink)
            .err()
            .unwrap();
        assert_eq!(
            e.error(),
            &Error::InvalidArgument("debounce period must be non-zero".into())
        );
    }

    #[test]
    fn closed_input() {
        let sim = sim();
        let (button, led) = open_pins(&sim, Polarity::ActiveHigh);
        // a stale handle to the same pin
        let stale = gpiomirror::PinHandle::input(
            button.id(),
            BUTTON,
            gpiomirror::EdgeDetection::Both,
            Polarity::ActiveLow,
        );
        sim.close(button).unwrap();
        let (sink, _rx) = channel();
        let e = Builder::new()
            .build(sim.clone(), stale, led, sink)
            .err()
            .unwrap();
        assert_eq!(e.error(), &Error::Closed(BUTTON.into()));
    }
}

mod debounce {
    use super::*;

    #[test]
    fn press_after_bounce() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);

        clock.set(ms(10));
        sim.pulldown(BUTTON).unwrap();
        clock.set(ms(15));
        sim.pullup(BUTTON).unwrap();
        clock.set(ms(20));
        sim.pulldown(BUTTON).unwrap();

        clock.set(ms(49));
        d.poll();
        assert!(drain(&rx).is_empty());
        assert_eq!(d.level(), LogicalLevel::Deasserted);
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::Low]);

        clock.set(ms(50));
        d.poll();
        assert_eq!(drain(&rx), [changed(LogicalLevel::Asserted, ms(50))]);
        assert_eq!(d.level(), LogicalLevel::Asserted);
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::Low, RawLevel::High]);
        assert_eq!(sim.get_level(LED).unwrap(), RawLevel::High);
    }

    #[test]
    fn pending_state() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, _rx) = manual(&sim, &clock, Polarity::ActiveHigh);

        let state = d.debounce_state();
        assert_eq!(state.last_stable_level, LogicalLevel::Deasserted);
        assert_eq!(state.pending_level, None);
        assert_eq!(state.pending_since, None);

        clock.set(ms(5));
        sim.pulldown(BUTTON).unwrap();
        let state = d.debounce_state();
        assert_eq!(state.last_stable_level, LogicalLevel::Deasserted);
        assert_eq!(state.pending_level, Some(LogicalLevel::Asserted));
        assert_eq!(state.pending_since, Some(Timestamp::from_duration(ms(5))));
    }

    #[test]
    fn bounce_only() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);

        for i in 1..=20 {
            clock.set(ms(i * 5));
            sim.toggle(BUTTON).unwrap();
        }
        // toggled an even number of times so back where it started
        clock.set(ms(500));
        d.poll();
        assert!(drain(&rx).is_empty());
        assert_eq!(d.level(), LogicalLevel::Deasserted);
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::Low]);
    }

    #[test]
    fn glitch() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);

        // an edge with no change in level
        sim.notify(BUTTON).unwrap();
        clock.set(ms(100));
        sim.notify(BUTTON).unwrap();
        assert!(drain(&rx).is_empty());
        assert_eq!(d.debounce_state().pending_level, None);
    }

    #[test]
    fn press_and_release() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);

        clock.set(ms(100));
        sim.pulldown(BUTTON).unwrap();
        clock.set(ms(130));
        d.poll();
        clock.set(ms(400));
        sim.pullup(BUTTON).unwrap();
        clock.set(ms(405));
        sim.pulldown(BUTTON).unwrap();
        clock.set(ms(410));
        sim.pullup(BUTTON).unwrap();
        clock.set(ms(439));
        d.poll();
        clock.set(ms(440));
        d.poll();
        // repeated polls do not repeat the event
        d.poll();

        assert_eq!(
            drain(&rx),
            [
                changed(LogicalLevel::Asserted, ms(130)),
                changed(LogicalLevel::Deasserted, ms(440)),
            ]
        );
        assert_eq!(
            sim.writes(LED).unwrap(),
            [RawLevel::Low, RawLevel::High, RawLevel::Low]
        );
    }

    #[test]
    fn promoted_by_later_edge() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);

        clock.set(ms(10));
        sim.pulldown(BUTTON).unwrap();
        // the edge notification reads the held level
        clock.set(ms(60));
        sim.notify(BUTTON).unwrap();
        assert_eq!(drain(&rx), [changed(LogicalLevel::Asserted, ms(60))]);
        assert_eq!(d.level(), LogicalLevel::Asserted);
    }
}

mod errors {
    use super::*;

    #[test]
    fn read_failure() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);

        sim.fail_reads(BUTTON, true).unwrap();
        sim.pulldown(BUTTON).unwrap();
        assert_eq!(
            drain(&rx),
            [Status::Failed(ErrorKind::Read, injected(IoOp::Read, BUTTON))]
        );
        assert_eq!(d.level(), LogicalLevel::Deasserted);
        assert_eq!(d.debounce_state().pending_level, None);
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::Low]);

        // recovers once reads succeed again
        sim.fail_reads(BUTTON, false).unwrap();
        clock.set(ms(10));
        d.poll();
        clock.set(ms(40));
        d.poll();
        assert_eq!(drain(&rx), [changed(LogicalLevel::Asserted, ms(40))]);
    }

    #[test]
    fn write_failure() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);

        sim.fail_writes(LED, true).unwrap();
        sim.pulldown(BUTTON).unwrap();
        clock.set(PERIOD);
        d.poll();
        assert_eq!(
            drain(&rx),
            [
                changed(LogicalLevel::Asserted, PERIOD),
                Status::Failed(ErrorKind::Write, injected(IoOp::Write, LED)),
            ]
        );
        // the logical level is authoritative
        assert_eq!(d.level(), LogicalLevel::Asserted);
        assert_eq!(sim.get_level(LED).unwrap(), RawLevel::Low);

        // and is not retried until the next change
        sim.fail_writes(LED, false).unwrap();
        d.poll();
        assert!(drain(&rx).is_empty());
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::Low]);
    }
}

mod shutdown {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn idempotent() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);
        assert!(!d.is_shutdown());

        d.shutdown();
        assert!(d.is_shutdown());
        assert_eq!(sim.subscriber_count(BUTTON), 0);
        d.shutdown();
        assert!(d.is_shutdown());

        // pins remain open
        assert!(sim.is_claimed(BUTTON));
        assert!(sim.is_claimed(LED));
        let (button, led) = d.into_pins();
        sim.close(button).unwrap();
        sim.close(led).unwrap();
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn nothing_after_shutdown() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);
        let late = sim.notifier(BUTTON).unwrap();

        sim.pulldown(BUTTON).unwrap();
        d.shutdown();
        clock.set(ms(100));
        late();
        d.poll();
        sim.fail_reads(BUTTON, true).unwrap();
        late();

        assert!(drain(&rx).is_empty());
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::Low]);
        assert_eq!(d.level(), LogicalLevel::Deasserted);
    }

    #[test]
    fn late_notification_after_drop() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, rx) = manual(&sim, &clock, Polarity::ActiveHigh);
        let late = sim.notifier(BUTTON).unwrap();
        drop(d);
        assert_eq!(sim.subscriber_count(BUTTON), 0);

        sim.pulldown(BUTTON).unwrap();
        clock.set(ms(100));
        late();
        assert!(drain(&rx).is_empty());
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::Low]);
    }

    #[test]
    fn drop_closes_pins() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, _rx) = manual(&sim, &clock, Polarity::ActiveHigh);
        drop(d);
        assert!(!sim.is_claimed(BUTTON));
        assert!(!sim.is_claimed(LED));

        // and so may be reopened
        let (button, led) = open_pins(&sim, Polarity::ActiveHigh);
        sim.close(button).unwrap();
        sim.close(led).unwrap();
    }

    #[test]
    fn drop_after_into_pins() {
        let sim = sim();
        let clock = ManualClock::new();
        let (d, _rx) = manual(&sim, &clock, Polarity::ActiveHigh);
        let (button, led) = d.into_pins();
        assert!(sim.is_claimed(BUTTON));
        assert!(sim.is_claimed(LED));
        sim.close(button).unwrap();
        sim.close(led).unwrap();
    }

    // Blocks reporting a change until released.
    struct GateSink {
        entered: Sender<()>,
        gate: Mutex<Receiver<()>>,
    }

    impl StatusSink for GateSink {
        fn state_changed(&self, _event: &EdgeEvent) {
            _ = self.entered.send(());
            _ = self.gate.lock().unwrap().recv();
        }

        fn error(&self, _kind: ErrorKind, _err: &Error) {}
    }

    #[test]
    fn waits_for_report_in_flight() {
        let sim = sim();
        let clock = ManualClock::new();
        let (button, led) = open_pins(&sim, Polarity::ActiveHigh);
        let (entered_tx, entered) = mpsc::channel();
        let (release, gate) = mpsc::channel();
        let sink = GateSink {
            entered: entered_tx,
            gate: Mutex::new(gate),
        };
        let d = Builder::new()
            .with_debounce_period(PERIOD)
            .with_clock(Arc::new(clock.clone()))
            .without_settle_timer()
            .build(sim.clone(), button, led, sink)
            .unwrap();

        sim.pulldown(BUTTON).unwrap();
        clock.set(PERIOD);
        let done = AtomicBool::new(false);
        thread::scope(|s| {
            let reporter = s.spawn(|| sim.notify(BUTTON).unwrap());
            entered.recv_timeout(STATUS_WAIT_TIMEOUT).unwrap();
            let stopper = s.spawn(|| {
                d.shutdown();
                done.store(true, Ordering::SeqCst);
            });
            thread::sleep(ms(50));
            assert!(!done.load(Ordering::SeqCst));
            assert!(d.is_shutdown());

            release.send(()).unwrap();
            stopper.join().unwrap();
            reporter.join().unwrap();
        });
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::Low, RawLevel::High]);
    }

    // Shuts the dispatcher down from within the sink.
    struct StopSink {
        dispatcher: Arc<OnceLock<Weak<Dispatcher<Sim>>>>,
        tx: Sender<EdgeEvent>,
    }

    impl StatusSink for StopSink {
        fn state_changed(&self, event: &EdgeEvent) {
            if let Some(d) = self.dispatcher.get().and_then(Weak::upgrade) {
                d.shutdown();
            }
            _ = self.tx.send(*event);
        }

        fn error(&self, _kind: ErrorKind, _err: &Error) {}
    }

    fn stop_on_change(
        sim: &Arc<Sim>,
        builder: &Builder,
    ) -> (Arc<Dispatcher<Sim>>, Receiver<EdgeEvent>) {
        let (button, led) = open_pins(sim, Polarity::ActiveHigh);
        let cell = Arc::new(OnceLock::new());
        let (tx, rx) = mpsc::channel();
        let sink = StopSink {
            dispatcher: cell.clone(),
            tx,
        };
        let d = Arc::new(builder.build(sim.clone(), button, led, sink).unwrap());
        cell.set(Arc::downgrade(&d)).unwrap();
        (d, rx)
    }

    #[test]
    fn from_sink() {
        let sim = sim();
        let clock = ManualClock::new();
        let mut builder = Builder::new();
        builder
            .with_debounce_period(PERIOD)
            .with_clock(Arc::new(clock.clone()))
            .without_settle_timer();
        let (d, rx) = stop_on_change(&sim, &builder);

        sim.pulldown(BUTTON).unwrap();
        clock.set(PERIOD);
        sim.notify(BUTTON).unwrap();
        assert_eq!(rx.try_iter().count(), 1);
        assert!(d.is_shutdown());
        assert_eq!(sim.subscriber_count(BUTTON), 0);

        sim.pullup(BUTTON).unwrap();
        clock.set(ms(200));
        d.poll();
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn from_sink_on_settle_timer() {
        let sim = sim();
        let mut builder = Builder::new();
        builder.with_debounce_period(ms(10));
        let (d, rx) = stop_on_change(&sim, &builder);

        sim.pulldown(BUTTON).unwrap();
        let event = rx.recv_timeout(STATUS_WAIT_TIMEOUT).unwrap();
        assert_eq!(event.level, LogicalLevel::Asserted);
        assert!(d.is_shutdown());
        drop(d);
    }

    // Holds each report until both a change and an error are being
    // reported, then shuts the dispatcher down.
    struct RendezvousSink {
        dispatcher: Arc<OnceLock<Weak<Dispatcher<Sim>>>>,
        entered: Sender<()>,
        both: Barrier,
    }

    impl RendezvousSink {
        fn stop(&self) {
            _ = self.entered.send(());
            self.both.wait();
            if let Some(d) = self.dispatcher.get().and_then(Weak::upgrade) {
                d.shutdown();
            }
        }
    }

    impl StatusSink for RendezvousSink {
        fn state_changed(&self, _event: &EdgeEvent) {
            self.stop();
        }

        fn error(&self, _kind: ErrorKind, _err: &Error) {
            self.stop();
        }
    }

    #[test]
    fn from_concurrent_sinks() {
        let sim = sim();
        let clock = ManualClock::new();
        let (button, led) = open_pins(&sim, Polarity::ActiveHigh);
        let cell = Arc::new(OnceLock::new());
        let (entered_tx, entered) = mpsc::channel();
        let sink = RendezvousSink {
            dispatcher: cell.clone(),
            entered: entered_tx,
            both: Barrier::new(2),
        };
        let d = Arc::new(
            Builder::new()
                .with_debounce_period(PERIOD)
                .with_clock(Arc::new(clock.clone()))
                .without_settle_timer()
                .build(sim.clone(), button, led, sink)
                .unwrap(),
        );
        cell.set(Arc::downgrade(&d)).unwrap();

        sim.pulldown(BUTTON).unwrap();
        clock.set(PERIOD);
        let (done_tx, done) = mpsc::channel();

        // detached, so a deadlock fails the test rather than hanging it
        let reporter = {
            let sim = sim.clone();
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                sim.notify(BUTTON).unwrap();
                _ = done_tx.send(());
            })
        };
        entered.recv_timeout(STATUS_WAIT_TIMEOUT).unwrap();

        sim.fail_reads(BUTTON, true).unwrap();
        let failer = {
            let sim = sim.clone();
            thread::spawn(move || {
                sim.notify(BUTTON).unwrap();
                _ = done_tx.send(());
            })
        };
        entered.recv_timeout(STATUS_WAIT_TIMEOUT).unwrap();

        done.recv_timeout(STATUS_WAIT_TIMEOUT).unwrap();
        done.recv_timeout(STATUS_WAIT_TIMEOUT).unwrap();
        reporter.join().unwrap();
        failer.join().unwrap();
        assert!(d.is_shutdown());
        assert_eq!(sim.subscriber_count(BUTTON), 0);
        assert_eq!(sim.writes(LED).unwrap(), [RawLevel::Low, RawLevel::High]);
    }
}

mod settle_timer {
    use super::*;

    #[test]
    fn promotes_without_further_edges() {
        let sim = sim();
        let (button, led) = open_pins(&sim, Polarity::ActiveHigh);
        let (sink, rx) = channel();
        let d = Builder::new()
            .with_debounce_period(ms(20))
            .build(sim.clone(), button, led, sink)
            .unwrap();

        sim.pulldown(BUTTON).unwrap();
        match rx.recv_timeout(STATUS_WAIT_TIMEOUT).unwrap() {
            Status::Changed(event) => assert_eq!(event.level, LogicalLevel::Asserted),
            status => panic!("unexpected status: {:?}", status),
        }
        assert_eq!(d.level(), LogicalLevel::Asserted);
        assert_eq!(sim.get_level(LED).unwrap(), RawLevel::High);

        sim.pullup(BUTTON).unwrap();
        match rx.recv_timeout(STATUS_WAIT_TIMEOUT).unwrap() {
            Status::Changed(event) => assert_eq!(event.level, LogicalLevel::Deasserted),
            status => panic!("unexpected status: {:?}", status),
        }
        assert_eq!(sim.get_level(LED).unwrap(), RawLevel::Low);

        d.shutdown();
        sim.pulldown(BUTTON).unwrap();
        assert!(rx.recv_timeout(ms(100)).is_err());
    }

    #[test]
    fn bounce_settles_once() {
        let sim = sim();
        let (button, led) = open_pins(&sim, Polarity::ActiveHigh);
        let (sink, rx) = channel();
        let _d = Builder::new()
            .with_debounce_period(ms(50))
            .build(sim.clone(), button, led, sink)
            .unwrap();

        for _ in 0..5 {
            sim.toggle(BUTTON).unwrap();
        }
        // odd number of toggles leaves the button pressed
        match rx.recv_timeout(STATUS_WAIT_TIMEOUT).unwrap() {
            Status::Changed(event) => assert_eq!(event.level, LogicalLevel::Asserted),
            status => panic!("unexpected status: {:?}", status),
        }
        assert!(rx.recv_timeout(ms(150)).is_err());
    }

    #[test]
    fn read_failure_backs_off() {
        let sim = sim();
        let (button, led) = open_pins(&sim, Polarity::ActiveHigh);
        let (sink, rx) = channel();
        let d = Builder::new()
            .with_debounce_period(ms(20))
            .build(sim.clone(), button, led, sink)
            .unwrap();

        sim.pulldown(BUTTON).unwrap();
        sim.fail_reads(BUTTON, true).unwrap();
        std::thread::sleep(ms(100));
        d.shutdown();
        let failures = drain(&rx)
            .into_iter()
            .filter(|s| matches!(s, Status::Failed(ErrorKind::Read, _)))
            .count();
        // one retry per period, not a spin
        assert!(failures >= 1);
        assert!(failures <= 10, "{} read failures", failures);
    }
}
