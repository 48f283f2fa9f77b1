/// SST39SF010A / 39SF020A / 39SF040 multi-purpose flash, byte-wide parallel
/// interface.
///
/// Protected operations need a "software data protection" unlock sequence
/// written first; the chip silently ignores them otherwise:
/// - byte program: 5555/AA, 2AAA/55, 5555/A0, then address/data
/// - chip erase: 5555/AA, 2AAA/55, 5555/80, 5555/AA, 2AAA/55, 5555/10
///
/// Only A0..A14 are decoded for the command addresses.

use std::fmt;
use std::str;

use crate::bus::{
	BusController,
	BusMode,
};
use crate::pins::PinDriver;

pub type Address = u32;

/// number of address lines of the largest supported part (512 KiB)
pub const ADDRESS_LINES: u8 = 19;

pub const COMMAND_ADDRESS_MASK: Address = 0x7fff;

/// (address, data) bus write cycles that must go out back to back
pub type CommandSequence = &'static [(Address, u8)];

pub const BYTE_PROGRAM_PREFIX: CommandSequence = &[
	(0x5555, 0xaa),
	(0x2aaa, 0x55),
	(0x5555, 0xa0),
];

pub const CHIP_ERASE: CommandSequence = &[
	(0x5555, 0xaa),
	(0x2aaa, 0x55),
	(0x5555, 0x80),
	(0x5555, 0xaa),
	(0x2aaa, 0x55),
	(0x5555, 0x10),
];

/// erased flash reads as all ones
pub const ERASED: u8 = 0xff;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ChipType {
	Sst39sf010a,
	Sst39sf020a,
	Sst39sf040,
}

impl ChipType {
	pub fn address_lines(self) -> u8 {
		match self {
			ChipType::Sst39sf010a => 17,
			ChipType::Sst39sf020a => 18,
			ChipType::Sst39sf040 => 19,
		}
	}
}

impl Default for ChipType {
	fn default() -> Self {
		ChipType::Sst39sf040
	}
}

impl fmt::Display for ChipType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			ChipType::Sst39sf010a => write!(f, "39SF010A"),
			ChipType::Sst39sf020a => write!(f, "39SF020A"),
			ChipType::Sst39sf040 => write!(f, "39SF040"),
		}
	}
}

impl str::FromStr for ChipType {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let name = s.to_ascii_uppercase();
		let name = name.trim_start_matches("SST");
		Ok(match name.trim_end_matches('A') {
			"39SF010" => ChipType::Sst39sf010a,
			"39SF020" => ChipType::Sst39sf020a,
			"39SF040" => ChipType::Sst39sf040,
			_ => bail!("unknown chip {:?} (supported: 39SF010A, 39SF020A, 39SF040)", s),
		})
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Geometry {
	pub address_lines: u8,
}

impl Default for Geometry {
	fn default() -> Self {
		Geometry { address_lines: ADDRESS_LINES }
	}
}

impl From<ChipType> for Geometry {
	fn from(chip: ChipType) -> Self {
		Geometry { address_lines: chip.address_lines() }
	}
}

impl Geometry {
	/// bytes on the chip
	pub fn size(&self) -> u32 {
		1 << self.address_lines
	}

	pub fn max_address(&self) -> Address {
		self.size() - 1
	}
}

/// Unlocked operations on top of the raw bus cycles.
///
/// A sequence only has effect when its cycles are issued back to back; these
/// methods never interleave anything else, and a sequence is never cut short
/// by anything but a pin driver failure.
pub trait CommandSequencer {
	fn emit_sequence(&mut self, sequence: &[(Address, u8)]) -> crate::AResult<()>;

	/// program one byte (can only clear bits; erase first)
	fn write_byte_unlocked(&mut self, address: Address, data: u8) -> crate::AResult<()>;

	/// erase the whole chip to 0xff; bus must be in write mode
	fn chip_erase(&mut self) -> crate::AResult<()>;
}

impl<P: PinDriver> CommandSequencer for BusController<P> {
	fn emit_sequence(&mut self, sequence: &[(Address, u8)]) -> crate::AResult<()> {
		for &(address, data) in sequence {
			self.write(address, data)?;
		}
		Ok(())
	}

	fn write_byte_unlocked(&mut self, address: Address, data: u8) -> crate::AResult<()> {
		self.emit_sequence(BYTE_PROGRAM_PREFIX)?;
		self.write(address, data)
	}

	fn chip_erase(&mut self) -> crate::AResult<()> {
		ensure!(self.mode() == BusMode::Write, "chip erase needs write mode (bus in {:?} mode)", self.mode());
		self.emit_sequence(CHIP_ERASE)?;
		// tSCE; the chip ignores everything until done
		let erase_cycle = self.timing().erase_cycle;
		self.delay(erase_cycle);
		Ok(())
	}
}
