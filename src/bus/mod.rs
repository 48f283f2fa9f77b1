/// Parallel bus of the chip: address via the shift register chain, eight
/// bidirectional data lines and the /CE, /WE, /OE control lines.
///
/// Timing: the chip gives no ready/valid signal in either direction. Every
/// `delay` below is a datasheet floor taken from `Timing`; shortening one is
/// never detected at runtime, data just silently goes wrong.

mod shifter;

use std::time::Duration;

pub use self::shifter::AddressShifter;

use crate::chip::Address;
use crate::pins::{
	Direction,
	Line,
	PinDriver,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BusMode {
	Idle,
	Read,
	Write,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Timing {
	/// after any shift register edge or data/control line change
	pub settle: Duration,
	/// after reconfiguring a line's direction, and at the end of a mode switch
	pub mode_settle: Duration,
	/// /WE low time (tWP)
	pub write_pulse: Duration,
	/// internal byte-program time (tBP) after /CE goes high
	pub write_cycle: Duration,
	/// internal chip-erase time (tSCE)
	pub erase_cycle: Duration,
}

impl Default for Timing {
	/// conservative values the reference board runs with
	fn default() -> Self {
		Timing {
			settle: Duration::from_micros(2),
			mode_settle: Duration::from_millis(1),
			write_pulse: Duration::from_micros(1),
			write_cycle: Duration::from_micros(25),
			erase_cycle: Duration::from_secs(1),
		}
	}
}

impl Timing {
	/// SST39SF0x0 datasheet minimums (70 ns part)
	pub fn datasheet() -> Self {
		Timing {
			settle: Duration::from_nanos(70),
			mode_settle: Duration::from_micros(1),
			write_pulse: Duration::from_nanos(20),
			write_cycle: Duration::from_micros(20),
			erase_cycle: Duration::from_millis(100),
		}
	}
}

pub struct BusController<P: PinDriver> {
	pins: P,
	shifter: AddressShifter,
	timing: Timing,
	mode: BusMode,
}

impl<P: PinDriver> BusController<P> {
	/// configures all control pins and leaves the chip selected but idle
	/// (/WE and /OE high, /CE low)
	pub fn new(mut pins: P, address_lines: u8, timing: Timing) -> crate::AResult<Self> {
		for &line in &[Line::ShiftLatch, Line::ShiftData, Line::ShiftClock] {
			pins.set_direction(line, Direction::Output)?;
			pins.set_line(line, false)?;
		}
		for &line in &[Line::ChipEnable, Line::WriteEnable, Line::OutputEnable] {
			pins.set_direction(line, Direction::Output)?;
		}
		pins.set_line(Line::WriteEnable, true)?;
		pins.set_line(Line::OutputEnable, true)?;
		pins.set_line(Line::ChipEnable, false)?;
		for &line in &Line::DATA {
			pins.set_direction(line, Direction::Input)?;
		}
		pins.delay(timing.mode_settle);

		Ok(BusController {
			pins,
			shifter: AddressShifter::new(address_lines, timing.settle),
			timing,
			mode: BusMode::Idle,
		})
	}

	pub fn mode(&self) -> BusMode {
		self.mode
	}

	pub fn timing(&self) -> &Timing {
		&self.timing
	}

	pub fn address_lines(&self) -> u8 {
		self.shifter.width()
	}

	pub fn pins(&self) -> &P {
		&self.pins
	}

	pub fn pins_mut(&mut self) -> &mut P {
		&mut self.pins
	}

	pub fn into_pins(self) -> P {
		self.pins
	}

	pub fn delay(&mut self, duration: Duration) {
		self.pins.delay(duration);
	}

	fn set_settled(&mut self, line: Line, high: bool) -> crate::AResult<()> {
		self.pins.set_line(line, high)?;
		self.pins.delay(self.timing.settle);
		Ok(())
	}

	/// data lines become pulled-down inputs; chip drives them with /OE and /CE low
	pub fn enter_read_mode(&mut self) -> crate::AResult<()> {
		for &line in &Line::DATA {
			if self.mode == BusMode::Write {
				// discharge the line before letting go of it
				self.pins.set_line(line, false)?;
				self.pins.delay(self.timing.mode_settle);
			}
			self.pins.set_direction(line, Direction::InputPullDown)?;
			self.pins.delay(self.timing.mode_settle);
		}

		self.set_settled(Line::WriteEnable, true)?;
		self.set_settled(Line::OutputEnable, false)?;
		self.set_settled(Line::ChipEnable, false)?;
		// from here on the address alone selects what the chip outputs
		self.pins.delay(self.timing.mode_settle);

		self.mode = BusMode::Read;
		trace!("bus in read mode");
		Ok(())
	}

	/// data lines become outputs (driven low); /OE, /CE and /WE high
	pub fn enter_write_mode(&mut self) -> crate::AResult<()> {
		// stop the chip driving the bus before we do
		self.set_settled(Line::OutputEnable, true)?;
		for &line in &Line::DATA {
			self.pins.set_direction(line, Direction::Output)?;
			self.pins.set_line(line, false)?;
		}

		self.set_settled(Line::ChipEnable, true)?;
		self.set_settled(Line::WriteEnable, true)?;
		self.pins.delay(self.timing.mode_settle);

		self.mode = BusMode::Write;
		trace!("bus in write mode");
		Ok(())
	}

	fn set_data(&mut self, data: u8) -> crate::AResult<()> {
		for (bit, &line) in Line::DATA.iter().enumerate() {
			self.pins.set_line(line, 0 != data & (1 << bit))?;
		}
		Ok(())
	}

	/// single /WE-controlled bus write cycle; no unlock sequence
	///
	/// Blocks for the full internal write cycle afterwards: the chip has no
	/// usable busy output on this board, and a cycle issued while it is still
	/// programming is ignored.
	pub fn write(&mut self, address: Address, data: u8) -> crate::AResult<()> {
		ensure!(self.mode == BusMode::Write, "bus write at 0x{:05x} while in {:?} mode", address, self.mode);

		self.pins.set_line(Line::OutputEnable, true)?;
		self.pins.set_line(Line::WriteEnable, true)?;
		self.pins.set_line(Line::ChipEnable, false)?;
		self.pins.delay(self.timing.settle);

		self.shifter.shift(&mut self.pins, address)?;
		self.set_data(data)?;
		self.pins.delay(self.timing.settle);

		// address latched on the falling, data on the rising /WE edge
		self.pins.set_line(Line::WriteEnable, false)?;
		self.pins.delay(self.timing.write_pulse);
		self.set_settled(Line::WriteEnable, true)?;

		self.pins.set_line(Line::ChipEnable, true)?;
		self.pins.delay(self.timing.write_cycle);

		Ok(())
	}

	/// read one byte; the settle after shifting covers the chip's access time
	pub fn read_byte(&mut self, address: Address) -> crate::AResult<u8> {
		ensure!(self.mode == BusMode::Read, "bus read at 0x{:05x} while in {:?} mode", address, self.mode);

		self.shifter.shift(&mut self.pins, address)?;
		self.pins.delay(self.timing.settle);

		let mut result = 0u8;
		for &line in Line::DATA.iter().rev() {
			result = result << 1 | (self.pins.read_line(line)? as u8);
		}
		Ok(result)
	}
}
