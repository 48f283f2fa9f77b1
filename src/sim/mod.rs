/// In-memory stand-in for the programmer board: pin levels, the 74HC595
/// address chain and an SST39SF0x0 behind it, on a virtual clock that only
/// `delay` advances.
///
/// Timing limits of the chip are enforced against that clock, so a sequence
/// that is too fast fails here the same silent way it does on hardware.

mod chip;

use std::time::Duration;

use crate::chip::Address;
use crate::pins::{
	Direction,
	Line,
	PinDriver,
};

pub use self::chip::{
	ACCESS_TIME,
	BYTE_PROGRAM_TIME,
	CHIP_ERASE_TIME,
	MIN_WRITE_PULSE,
};

const LINES: usize = 15;

fn index(line: Line) -> usize {
	match line {
		Line::ShiftData => 0,
		Line::ShiftClock => 1,
		Line::ShiftLatch => 2,
		Line::ChipEnable => 3,
		Line::WriteEnable => 4,
		Line::OutputEnable => 5,
		Line::Data(n) => {
			assert!(n < 8);
			6 + n as usize
		},
		Line::Led => 14,
	}
}

pub struct SimulatedBus {
	levels: [bool; LINES],
	directions: [Direction; LINES],
	now: Duration,
	width: u8,
	shift: u32,
	latched: u32,
	latched_at: Duration,
	// start of the current write strobe (/CE and /WE low) and the address then
	strobe: Option<(Duration, Address)>,
	chip: chip::Chip,
	check_timing: bool,
	contention: bool,
	led_flashes: usize,
}

impl SimulatedBus {
	/// empty (erased) chip with `address_lines` lines behind a chain shifting
	/// as many bits
	pub fn new(address_lines: u8) -> Self {
		assert!(address_lines >= 15 && address_lines <= 24);
		SimulatedBus {
			levels: [false; LINES],
			directions: [Direction::Input; LINES],
			now: Duration::from_secs(0),
			width: address_lines,
			shift: 0,
			latched: 0,
			latched_at: Duration::from_secs(0),
			strobe: None,
			chip: chip::Chip::new(address_lines),
			check_timing: true,
			contention: false,
			led_flashes: 0,
		}
	}

	/// disable pulse width and access time checks (busy windows stay)
	pub fn without_timing_checks(mut self) -> Self {
		self.check_timing = false;
		self
	}

	pub fn memory(&self) -> &[u8] {
		self.chip.memory()
	}

	pub fn memory_mut(&mut self) -> &mut [u8] {
		self.chip.memory_mut()
	}

	/// overwrite one byte behind the bus' back
	pub fn corrupt(&mut self, address: Address, value: u8) {
		self.chip.memory_mut()[address as usize] = value;
	}

	pub fn now(&self) -> Duration {
		self.now
	}

	pub fn level(&self, line: Line) -> bool {
		self.levels[index(line)]
	}

	pub fn direction(&self, line: Line) -> Direction {
		self.directions[index(line)]
	}

	/// raw storage register of the chain (Q0 of the first stage in bit 0)
	pub fn latched(&self) -> u32 {
		self.latched
	}

	/// address the chain currently presents on A0..An
	pub fn address(&self) -> Address {
		// first bit shifted in ends up in the last stage, which is wired to A0
		(0..self.width).fold(0, |addr, i| {
			addr | ((self.latched >> (self.width - 1 - i)) & 1) << i
		})
	}

	/// both the host and the chip drove the data bus at some point
	pub fn contention(&self) -> bool {
		self.contention
	}

	pub fn dropped_cycles(&self) -> usize {
		self.chip.dropped_cycles()
	}

	pub fn programmed_bytes(&self) -> usize {
		self.chip.programmed_bytes()
	}

	pub fn erase_count(&self) -> usize {
		self.chip.erase_count()
	}

	pub fn led_flashes(&self) -> usize {
		self.led_flashes
	}

	fn low(&self, line: Line) -> bool {
		!self.levels[index(line)]
	}

	fn chip_drives_bus(&self) -> bool {
		self.low(Line::ChipEnable) && self.low(Line::OutputEnable) && !self.low(Line::WriteEnable)
	}

	fn host_data(&self) -> u8 {
		Line::DATA.iter().enumerate().fold(0, |data, (bit, &line)| {
			let i = index(line);
			let driven = self.directions[i].is_output() && self.levels[i];
			data | (driven as u8) << bit
		})
	}

	fn check_contention(&mut self) {
		if self.chip_drives_bus() && Line::DATA.iter().any(|&l| self.directions[index(l)].is_output()) {
			if !self.contention {
				warn!("sim: data bus contention at address 0x{:05x}", self.address());
			}
			self.contention = true;
		}
	}

	fn update_strobe(&mut self) {
		let active = self.low(Line::ChipEnable) && self.low(Line::WriteEnable) && !self.low(Line::OutputEnable);
		match (active, self.strobe) {
			(true, None) => {
				self.strobe = Some((self.now, self.address()));
			},
			(false, Some((start, address))) => {
				self.strobe = None;
				let data = self.host_data();
				let now = self.now;
				self.chip.write_cycle(now, address, data, now - start, self.check_timing);
			},
			_ => (),
		}
	}
}

impl PinDriver for SimulatedBus {
	fn set_line(&mut self, line: Line, high: bool) -> crate::AResult<()> {
		let i = index(line);
		let rising = !self.levels[i] && high;
		self.levels[i] = high;

		if rising {
			match line {
				Line::ShiftClock => {
					let mask = (1u32 << self.width) - 1;
					let bit = self.levels[index(Line::ShiftData)] as u32;
					self.shift = ((self.shift << 1) | bit) & mask;
				},
				Line::ShiftLatch => {
					self.latched = self.shift;
					self.latched_at = self.now;
				},
				Line::Led => self.led_flashes += 1,
				_ => (),
			}
		}

		if let Line::ChipEnable | Line::WriteEnable | Line::OutputEnable = line {
			self.update_strobe();
		}
		self.check_contention();
		Ok(())
	}

	fn set_direction(&mut self, line: Line, direction: Direction) -> crate::AResult<()> {
		self.directions[index(line)] = direction;
		self.check_contention();
		Ok(())
	}

	fn read_line(&mut self, line: Line) -> crate::AResult<bool> {
		let i = index(line);
		if self.directions[i].is_output() {
			return Ok(self.levels[i]);
		}
		match line {
			Line::Data(bit) => {
				if self.chip_drives_bus() {
					let age = self.now - self.latched_at;
					let address = self.address();
					let value = self.chip.output(self.now, address, age, self.check_timing);
					Ok(0 != value & (1 << bit))
				} else {
					// floating inputs tend to read high; the pull-down wins otherwise
					Ok(self.directions[i] != Direction::InputPullDown)
				}
			},
			_ => bail!("sim: {} is not an input", line),
		}
	}

	fn delay(&mut self, duration: Duration) {
		self.now += duration;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn clock_in(sim: &mut SimulatedBus, bits: &[bool]) {
		for &bit in bits {
			sim.set_line(Line::ShiftData, bit).unwrap();
			sim.set_line(Line::ShiftClock, true).unwrap();
			sim.set_line(Line::ShiftClock, false).unwrap();
		}
		sim.set_line(Line::ShiftLatch, true).unwrap();
		sim.set_line(Line::ShiftLatch, false).unwrap();
	}

	#[test]
	fn first_bit_lands_on_a0() {
		let mut sim = SimulatedBus::new(15);
		let mut bits = vec![false; 15];
		bits[0] = true;
		clock_in(&mut sim, &bits);
		assert_eq!(sim.latched(), 1 << 14);
		assert_eq!(sim.address(), 1);
	}

	#[test]
	fn latch_holds_until_pulsed() {
		let mut sim = SimulatedBus::new(15);
		clock_in(&mut sim, &[true; 15]);
		sim.set_line(Line::ShiftData, false).unwrap();
		sim.set_line(Line::ShiftClock, true).unwrap();
		assert_eq!(sim.address(), 0x7fff);
	}

	#[test]
	fn undriven_bus_reads_pull_level() {
		let mut sim = SimulatedBus::new(15);
		sim.set_line(Line::OutputEnable, true).unwrap();
		sim.set_direction(Line::Data(0), Direction::InputPullDown).unwrap();
		assert!(!sim.read_line(Line::Data(0)).unwrap());
		assert!(sim.read_line(Line::Data(1)).unwrap());
	}

	#[test]
	fn contention_detected() {
		let mut sim = SimulatedBus::new(15);
		sim.set_line(Line::WriteEnable, true).unwrap();
		sim.set_direction(Line::Data(3), Direction::Output).unwrap();
		// /CE and /OE low
		sim.set_line(Line::ChipEnable, false).unwrap();
		sim.set_line(Line::OutputEnable, false).unwrap();
		assert!(sim.contention());
	}

	#[test]
	fn delay_advances_virtual_clock() {
		let mut sim = SimulatedBus::new(15);
		sim.delay(Duration::from_millis(3));
		sim.delay(Duration::from_micros(5));
		assert_eq!(sim.now(), Duration::from_micros(3005));
	}
}
