use std::time::Duration;

use crate::chip::{
	Address,
	COMMAND_ADDRESS_MASK,
};

// datasheet limits the model enforces
pub const MIN_WRITE_PULSE: Duration = Duration::from_nanos(20);
pub const ACCESS_TIME: Duration = Duration::from_nanos(70);
pub const BYTE_PROGRAM_TIME: Duration = Duration::from_micros(20);
pub const CHIP_ERASE_TIME: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
	Ready,
	Unlocked1,
	Unlocked2,
	ByteProgram,
	EraseSetup,
	EraseUnlocked1,
	EraseUnlocked2,
}

/// SST39SF0x0 command decoder and memory array
pub struct Chip {
	memory: Vec<u8>,
	state: State,
	busy_until: Duration,
	// data of the byte program in progress, for DQ7 polling
	busy_data: Option<u8>,
	toggle: u8,
	dropped: usize,
	programmed: usize,
	erases: usize,
}

impl Chip {
	pub fn new(address_lines: u8) -> Self {
		Chip {
			memory: vec![0xff; 1 << address_lines],
			state: State::Ready,
			busy_until: Duration::from_secs(0),
			busy_data: None,
			toggle: 0,
			dropped: 0,
			programmed: 0,
			erases: 0,
		}
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn memory_mut(&mut self) -> &mut [u8] {
		&mut self.memory
	}

	pub fn dropped_cycles(&self) -> usize {
		self.dropped
	}

	pub fn programmed_bytes(&self) -> usize {
		self.programmed
	}

	pub fn erase_count(&self) -> usize {
		self.erases
	}

	pub fn is_busy(&self, now: Duration) -> bool {
		now < self.busy_until
	}

	/// completed bus write cycle (rising /WE or /CE edge)
	pub fn write_cycle(&mut self, now: Duration, address: Address, data: u8, pulse: Duration, check_pulse: bool) {
		if check_pulse && pulse < MIN_WRITE_PULSE {
			trace!("sim: /WE pulse {:?} too short, cycle dropped", pulse);
			self.dropped += 1;
			return;
		}
		if self.is_busy(now) {
			trace!("sim: cycle 0x{:05x}/0x{:02x} while busy, dropped", address, data);
			self.dropped += 1;
			return;
		}

		let command = address & COMMAND_ADDRESS_MASK;
		self.state = match (self.state, command, data) {
			(State::Ready, 0x5555, 0xaa) => State::Unlocked1,
			(State::Unlocked1, 0x2aaa, 0x55) => State::Unlocked2,
			(State::Unlocked2, 0x5555, 0xa0) => State::ByteProgram,
			(State::Unlocked2, 0x5555, 0x80) => State::EraseSetup,
			(State::ByteProgram, _, _) => {
				let index = address as usize % self.memory.len();
				// flash can only clear bits
				self.memory[index] &= data;
				self.busy_until = now + BYTE_PROGRAM_TIME;
				self.busy_data = Some(data);
				self.programmed += 1;
				State::Ready
			},
			(State::EraseSetup, 0x5555, 0xaa) => State::EraseUnlocked1,
			(State::EraseUnlocked1, 0x2aaa, 0x55) => State::EraseUnlocked2,
			(State::EraseUnlocked2, 0x5555, 0x10) => {
				for b in self.memory.iter_mut() {
					*b = 0xff;
				}
				self.busy_until = now + CHIP_ERASE_TIME;
				self.busy_data = None;
				self.erases += 1;
				State::Ready
			},
			(state, _, _) => {
				if state != State::Ready {
					trace!("sim: sequence broken in {:?} by 0x{:05x}/0x{:02x}", state, address, data);
				}
				State::Ready
			},
		};
	}

	/// what the chip drives onto DQ0..7 while /CE and /OE are low
	pub fn output(&mut self, now: Duration, address: Address, address_age: Duration, check_access: bool) -> u8 {
		if self.is_busy(now) {
			// DQ7: complement of the byte being programmed (0 while erasing); DQ6 toggles
			self.toggle ^= 0x40;
			let polling = match self.busy_data {
				Some(data) => !data & 0x80,
				None => 0,
			};
			return polling | self.toggle;
		}
		let value = self.memory[address as usize % self.memory.len()];
		if check_access && address_age < ACCESS_TIME {
			// outputs still follow the previous address
			return !value;
		}
		value
	}
}
