use std::time::Duration;

use crate::pins::{
	Line,
	PinDriver,
};

/// lines the display on the reference board can show
pub const MAX_STATUS_LINES: usize = 5;

pub trait StatusSink {
	/// show up to `MAX_STATUS_LINES` short lines, replacing what was shown before
	fn report(&mut self, lines: &[&str]);
}

impl<'a, S: ?Sized + StatusSink> StatusSink for &'a mut S {
	fn report(&mut self, lines: &[&str]) {
		S::report(*self, lines)
	}
}

/// reports through the `log` facade
#[derive(Clone, Copy, Default, Debug)]
pub struct LogStatus;

impl StatusSink for LogStatus {
	fn report(&mut self, lines: &[&str]) {
		let lines = &lines[..std::cmp::min(lines.len(), MAX_STATUS_LINES)];
		let text = lines.iter()
			.map(|l| l.trim())
			.filter(|l| !l.is_empty())
			.collect::<Vec<_>>()
			.join(" ");
		info!("{}", text);
	}
}

/// keeps every report; for tests and dry runs
#[derive(Clone, Default, Debug)]
pub struct MemoryStatus {
	pub screens: Vec<Vec<String>>,
}

impl MemoryStatus {
	pub fn last(&self) -> Option<&[String]> {
		self.screens.last().map(|s| &s[..])
	}

	pub fn contains(&self, needle: &str) -> bool {
		self.screens.iter().any(|s| s.iter().any(|l| l.contains(needle)))
	}
}

impl StatusSink for MemoryStatus {
	fn report(&mut self, lines: &[&str]) {
		let lines = &lines[..std::cmp::min(lines.len(), MAX_STATUS_LINES)];
		self.screens.push(lines.iter().map(|l| l.to_string()).collect());
	}
}

/// Something around the engines (mounting / opening the source, mapping the
/// GPIOs) failed and the run can't start.
pub trait FatalSignal {
	fn on_fatal(&mut self, context: &str);
}

#[derive(Clone, Copy, Default, Debug)]
pub struct LogFatal;

impl FatalSignal for LogFatal {
	fn on_fatal(&mut self, context: &str) {
		error!("{}", context);
	}
}

const BLINKS: usize = 3;
const BLINK_HALF_PERIOD: Duration = Duration::from_millis(500);

/// logs, then blinks the board LED three times
pub struct BlinkLed<'a, P: PinDriver + ?Sized> {
	pins: &'a mut P,
}

impl<'a, P: PinDriver + ?Sized> BlinkLed<'a, P> {
	pub fn new(pins: &'a mut P) -> Self {
		BlinkLed { pins }
	}

	fn blink(&mut self) -> crate::AResult<()> {
		self.pins.set_direction(Line::Led, crate::pins::Direction::Output)?;
		for _ in 0..BLINKS {
			self.pins.set_line(Line::Led, true)?;
			self.pins.delay(BLINK_HALF_PERIOD);
			self.pins.set_line(Line::Led, false)?;
			self.pins.delay(BLINK_HALF_PERIOD);
		}
		Ok(())
	}
}

impl<'a, P: PinDriver + ?Sized> FatalSignal for BlinkLed<'a, P> {
	fn on_fatal(&mut self, context: &str) {
		error!("{}", context);
		if let Err(e) = self.blink() {
			// no LED wired is fine
			debug!("couldn't blink status LED: {}", e);
		}
	}
}
