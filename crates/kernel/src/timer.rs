use std::time::Duration;

/// Disposal handle for an interval timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub(crate) u64);

struct Interval {
    handle: TimerHandle,
    period: Duration,
    next_due: Duration,
    callback: Box<dyn FnMut()>,
}

/// Periodic callbacks pumped from the tick loop.
///
/// Periods are truncated to whole milliseconds, minimum one. A timer fires
/// at most once per pump; one that fell more than a period behind is
/// re-phased to `now + period` rather than firing a burst.
#[derive(Default)]
pub(crate) struct IntervalTimers {
    entries: Vec<Interval>,
}

impl IntervalTimers {
    pub(crate) fn insert(
        &mut self,
        handle: TimerHandle,
        now: Duration,
        period: Duration,
        callback: Box<dyn FnMut()>,
    ) {
        let millis = period.as_millis().clamp(1, u128::from(u64::MAX)) as u64;
        let period = Duration::from_millis(millis);
        self.entries.push(Interval {
            handle,
            period,
            next_due: now + period,
            callback,
        });
    }

    pub(crate) fn remove(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Fire every due timer. Returns how many fired.
    pub(crate) fn pump(&mut self, now: Duration) -> usize {
        let mut fired = 0;
        for entry in &mut self.entries {
            if now < entry.next_due {
                continue;
            }
            (entry.callback)();
            fired += 1;
            entry.next_due += entry.period;
            if entry.next_due <= now {
                entry.next_due = now + entry.period;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter() -> (Rc<Cell<u32>>, Box<dyn FnMut()>) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, Box::new(move || c.set(c.get() + 1)))
    }

    #[test]
    fn fires_on_period() {
        let mut timers = IntervalTimers::default();
        let (count, cb) = counter();
        timers.insert(TimerHandle(1), Duration::ZERO, Duration::from_millis(100), cb);
        for step in 1..=10u64 {
            timers.pump(Duration::from_millis(step * 50));
        }
        assert_eq!(count.get(), 5);
    }

    #[test]
    fn late_pump_fires_once_and_rephases() {
        let mut timers = IntervalTimers::default();
        let (count, cb) = counter();
        timers.insert(TimerHandle(1), Duration::ZERO, Duration::from_millis(100), cb);
        timers.pump(Duration::from_millis(350));
        assert_eq!(count.get(), 1);
        // next due at 450, not 200
        timers.pump(Duration::from_millis(400));
        assert_eq!(count.get(), 1);
        timers.pump(Duration::from_millis(450));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn sub_millisecond_period_rounds_up() {
        let mut timers = IntervalTimers::default();
        let (count, cb) = counter();
        timers.insert(TimerHandle(1), Duration::ZERO, Duration::from_micros(10), cb);
        timers.pump(Duration::from_micros(500));
        assert_eq!(count.get(), 0);
        timers.pump(Duration::from_millis(1));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn removed_timer_stops() {
        let mut timers = IntervalTimers::default();
        let (count, cb) = counter();
        timers.insert(TimerHandle(7), Duration::ZERO, Duration::from_millis(10), cb);
        assert!(timers.remove(TimerHandle(7)));
        assert!(!timers.remove(TimerHandle(7)));
        timers.pump(Duration::from_secs(1));
        assert_eq!(count.get(), 0);
        assert_eq!(timers.len(), 0);
    }
}
