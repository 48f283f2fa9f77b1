use std::time::Duration;

use crate::chip::Address;
use crate::pins::{
	Line,
	PinDriver,
};

/// Puts an address on the 74HC595 chain driving A0..An.
///
/// Bits are shifted least significant first, so A0 travels furthest down the
/// chain; the board wires A0 to the last stage.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AddressShifter {
	width: u8,
	settle: Duration,
}

impl AddressShifter {
	/// `width`: clock pulses per address (number of address lines)
	pub fn new(width: u8, settle: Duration) -> Self {
		assert!(width > 0 && width <= 32);
		AddressShifter { width, settle }
	}

	pub fn width(&self) -> u8 {
		self.width
	}

	/// shift `address` out and latch it onto the parallel outputs
	///
	/// Every edge is followed by the settle delay: the 74HC595 and the level
	/// shifters need that propagation time and there is nothing to poll.
	pub fn shift<P: PinDriver + ?Sized>(&self, pins: &mut P, address: Address) -> crate::AResult<()> {
		assert!(
			self.width == 32 || address >> self.width == 0,
			"address 0x{:x} wider than {} address lines", address, self.width
		);

		pins.set_line(Line::ShiftLatch, false)?;
		pins.set_line(Line::ShiftData, false)?;
		pins.set_line(Line::ShiftClock, false)?;

		let mut rest = address;
		for _ in 0..self.width {
			pins.set_line(Line::ShiftData, 0 != rest & 1)?;
			rest >>= 1;
			pins.delay(self.settle);
			pins.set_line(Line::ShiftClock, true)?;
			pins.delay(self.settle);
			pins.set_line(Line::ShiftClock, false)?;
			pins.delay(self.settle);
		}

		pins.set_line(Line::ShiftLatch, true)?;
		pins.delay(self.settle);
		pins.set_line(Line::ShiftLatch, false)?;
		pins.delay(self.settle);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pins::Direction;

	// records the data bit seen at every rising clock edge and every latch
	#[derive(Default)]
	struct Recorder {
		levels: std::collections::HashMap<Line, bool>,
		shifted: Vec<bool>,
		latches: usize,
		delays: usize,
	}

	impl PinDriver for Recorder {
		fn set_line(&mut self, line: Line, high: bool) -> crate::AResult<()> {
			let old = self.levels.insert(line, high).unwrap_or(false);
			if !old && high {
				match line {
					Line::ShiftClock => {
						let bit = self.levels.get(&Line::ShiftData).cloned().unwrap_or(false);
						self.shifted.push(bit);
					},
					Line::ShiftLatch => self.latches += 1,
					_ => (),
				}
			}
			Ok(())
		}
		fn set_direction(&mut self, _line: Line, _direction: Direction) -> crate::AResult<()> {
			Ok(())
		}
		fn read_line(&mut self, line: Line) -> crate::AResult<bool> {
			Ok(self.levels.get(&line).cloned().unwrap_or(false))
		}
		fn delay(&mut self, _duration: Duration) {
			self.delays += 1;
		}
	}

	#[test]
	fn zero_shifts_all_zero_bits() {
		let mut rec = Recorder::default();
		AddressShifter::new(19, Duration::from_nanos(0)).shift(&mut rec, 0).unwrap();
		assert_eq!(rec.shifted, vec![false; 19]);
		assert_eq!(rec.latches, 1);
	}

	#[test]
	fn max_address_shifts_all_ones() {
		let mut rec = Recorder::default();
		AddressShifter::new(19, Duration::from_nanos(0)).shift(&mut rec, (1 << 19) - 1).unwrap();
		assert_eq!(rec.shifted, vec![true; 19]);
	}

	#[test]
	fn lsb_first() {
		let mut rec = Recorder::default();
		AddressShifter::new(4, Duration::from_nanos(0)).shift(&mut rec, 0b0011).unwrap();
		assert_eq!(rec.shifted, vec![true, true, false, false]);
	}

	#[test]
	fn settle_after_every_edge() {
		let mut rec = Recorder::default();
		AddressShifter::new(19, Duration::from_nanos(100)).shift(&mut rec, 0x2aaa).unwrap();
		// data, clock high, clock low per bit; latch high and low
		assert_eq!(rec.delays, 3 * 19 + 2);
	}

	#[test]
	#[should_panic]
	fn address_wider_than_lines_panics() {
		let mut rec = Recorder::default();
		let _ = AddressShifter::new(19, Duration::from_nanos(0)).shift(&mut rec, 1 << 19);
	}
}
