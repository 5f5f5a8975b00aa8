//! Alarm-driven tick source. `TIMER0_IRQ_0` re-arms the alarm one period
//! ahead of the previous deadline and raises [`READY`]; the main loop picks
//! the tick up through a [`FlagCadence`](adc_sampler::FlagCadence).

use core::cell::RefCell;

use adc_sampler::ReadyFlag;
use critical_section::Mutex;
use fugit::MicrosDurationU64;
use rp235x_hal as hal;

use hal::pac::interrupt;
use hal::timer::{Alarm, Alarm0, CopyableTimer0, Instant, Timer};

pub static READY: ReadyFlag = ReadyFlag::new();

static TICKER: Mutex<RefCell<Option<Ticker>>> = Mutex::new(RefCell::new(None));

struct Ticker {
    alarm: Alarm0<CopyableTimer0>,
    timer: Timer<CopyableTimer0>,
    deadline: Instant,
    period: MicrosDurationU64,
}

impl Ticker {
    /// Deadlines stay phase-locked to the first one. If interrupt latency
    /// has already carried us past the next deadline, restart the phase
    /// from now.
    fn rearm(&mut self) {
        self.alarm.clear_interrupt();
        self.deadline = self.deadline + self.period;
        if self.deadline <= self.timer.get_counter() || self.alarm.schedule_at(self.deadline).is_err() {
            self.deadline = self.timer.get_counter() + self.period;
            // cannot fail, the deadline is a full period away
            let _ = self.alarm.schedule_at(self.deadline);
        }
    }
}

/// Starts ticking every `period_us`, first tick one period from now.
pub fn start(timer: &mut Timer<CopyableTimer0>, period_us: u32) {
    let Some(mut alarm) = timer.alarm_0() else {
        defmt::panic!("alarm 0 already taken");
    };
    let period = MicrosDurationU64::micros(u64::from(period_us));
    let deadline = timer.get_counter() + period;
    let _ = alarm.schedule_at(deadline);
    alarm.enable_interrupt();

    critical_section::with(|cs| {
        TICKER.borrow_ref_mut(cs).replace(Ticker {
            alarm,
            timer: *timer,
            deadline,
            period,
        });
    });
    // SAFETY: the handler only touches state behind the critical section
    // and the atomic flag.
    unsafe { cortex_m::peripheral::NVIC::unmask(hal::pac::Interrupt::TIMER0_IRQ_0) };
}

#[interrupt]
fn TIMER0_IRQ_0() {
    critical_section::with(|cs| {
        if let Some(ticker) = TICKER.borrow_ref_mut(cs).as_mut() {
            ticker.rearm();
        }
    });
    READY.signal();
}
