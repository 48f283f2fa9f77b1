use std::fmt;
use std::thread;
use std::time::{
	Duration,
	Instant,
};

mod gpiomem;
mod layout;

pub use self::gpiomem::{
	Bcm2835Gpio,
	open_gpiomem,
};

pub use self::layout::PinLayout;

// below this thread::sleep is too coarse; spin instead
const SPIN_LIMIT: Duration = Duration::from_micros(100);

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

/// wait at least `duration`; spins for short intervals
pub fn busy_wait(duration: Duration) {
	if duration >= SPIN_LIMIT {
		reliable_sleep(duration);
		return;
	}
	let start = Instant::now();
	while start.elapsed() < duration {
		std::hint::spin_loop();
	}
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Line {
	/// serial input of the first 74HC595
	ShiftData,
	/// shift register clock (SRCLK)
	ShiftClock,
	/// storage register clock (RCLK)
	ShiftLatch,
	/// /CE (active low)
	ChipEnable,
	/// /WE (active low)
	WriteEnable,
	/// /OE (active low)
	OutputEnable,
	/// DQ0..DQ7
	Data(u8),
	/// status LED on the board
	Led,
}

impl Line {
	pub const DATA: [Line; 8] = [
		Line::Data(0), Line::Data(1), Line::Data(2), Line::Data(3),
		Line::Data(4), Line::Data(5), Line::Data(6), Line::Data(7),
	];
}

impl fmt::Display for Line {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Line::ShiftData => write!(f, "SER"),
			Line::ShiftClock => write!(f, "SRCLK"),
			Line::ShiftLatch => write!(f, "RCLK"),
			Line::ChipEnable => write!(f, "/CE"),
			Line::WriteEnable => write!(f, "/WE"),
			Line::OutputEnable => write!(f, "/OE"),
			Line::Data(n) => write!(f, "DQ{}", n),
			Line::Led => write!(f, "LED"),
		}
	}
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
	Output,
	Input,
	/// input with the pull-down enabled, so an undriven line reads low
	InputPullDown,
}

impl Direction {
	pub fn is_output(self) -> bool {
		self == Direction::Output
	}
}

pub trait PinDriver {
	fn set_line(&mut self, line: Line, high: bool) -> crate::AResult<()>;
	fn set_direction(&mut self, line: Line, direction: Direction) -> crate::AResult<()>;
	fn read_line(&mut self, line: Line) -> crate::AResult<bool>;

	/// block for at least `duration`
	///
	/// All timing of the protocol is expressed through this call; there is no
	/// feedback from the chip, so a backend returning early breaks writes
	/// silently.
	fn delay(&mut self, duration: Duration) {
		busy_wait(duration);
	}
}

impl<'a, P: ?Sized + PinDriver> PinDriver for &'a mut P {
	fn set_line(&mut self, line: Line, high: bool) -> crate::AResult<()> {
		P::set_line(*self, line, high)
	}
	fn set_direction(&mut self, line: Line, direction: Direction) -> crate::AResult<()> {
		P::set_direction(*self, line, direction)
	}
	fn read_line(&mut self, line: Line) -> crate::AResult<bool> {
		P::read_line(*self, line)
	}
	fn delay(&mut self, duration: Duration) {
		P::delay(*self, duration)
	}
}
