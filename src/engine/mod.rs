mod program;
mod verify;

use std::fmt;

use failure::Fail;

use crate::bus::BusController;
use crate::chip::{
	Address,
	CommandSequencer,
};
use crate::pins::PinDriver;
use crate::source::SourceStream;
use crate::status::StatusSink;

pub use self::program::program;
pub use self::verify::{
	verify_against_source,
	verify_erased,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Mismatch {
	pub address: Address,
	pub expected: u8,
	pub actual: u8,
}

impl fmt::Display for Mismatch {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "@0x{:05x}: expected 0x{:02x}, chip has 0x{:02x}", self.address, self.expected, self.actual)
	}
}

/// outcome of a verify run; only complete runs produce one
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct VerificationResult {
	/// first address not checked
	pub end: Address,
	pub mismatches: Vec<Mismatch>,
}

impl VerificationResult {
	pub fn errors(&self) -> usize {
		self.mismatches.len()
	}

	pub fn is_ok(&self) -> bool {
		self.mismatches.is_empty()
	}
}

/// The source failed mid-run; everything before `at` was processed.
#[derive(Debug)]
pub struct SourceInterrupted {
	pub at: Address,
	cause: failure::Error,
}

impl fmt::Display for SourceInterrupted {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "source failed after {} bytes: {}", self.at, self.cause)
	}
}

impl Fail for SourceInterrupted {
	fn cause(&self) -> Option<&dyn Fail> {
		Some(self.cause.as_fail())
	}
}

/// The source holds more bytes than the chip; the run stopped at `at`
/// (which equals the chip size).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AddressOverflow {
	pub at: Address,
}

impl fmt::Display for AddressOverflow {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "source larger than chip: no address 0x{:05x}", self.at)
	}
}

impl Fail for AddressOverflow {}

fn next_chunk<'s, S: SourceStream + ?Sized>(
	source: &'s mut S,
	cursor: Address,
	status: &mut dyn StatusSink,
) -> crate::AResult<crate::source::Chunk<'s>> {
	source.next_chunk().map_err(|cause| {
		warn!("source failed after {} bytes: {}", cursor, cause);
		status.report(&["Source error!", "stopped at", &format!("Addrs: 0x{:05X}", cursor)]);
		SourceInterrupted { at: cursor, cause }.into()
	})
}

fn check_address<P: PinDriver>(bus: &BusController<P>, cursor: Address) -> crate::AResult<()> {
	if (cursor as u64) >> bus.address_lines() != 0 {
		return Err(AddressOverflow { at: cursor }.into());
	}
	Ok(())
}

pub fn erase_chip<P: PinDriver>(bus: &mut BusController<P>, status: &mut dyn StatusSink) -> crate::AResult<()> {
	status.report(&["Erasing", "EEPROM", "now..."]);
	bus.enter_write_mode()?;
	bus.chip_erase()?;
	info!("chip erase complete");
	status.report(&["EEPROM", "erase", "complete!"]);
	Ok(())
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FlashReport {
	pub erase: VerificationResult,
	/// bytes programmed; 0 if the erase didn't verify
	pub written: Address,
	/// `None` if programming was skipped
	pub verify: Option<VerificationResult>,
}

impl FlashReport {
	pub fn is_ok(&self) -> bool {
		self.erase.is_ok() && self.verify.as_ref().map_or(false, |v| v.is_ok())
	}
}

/// erase, check erase, program, verify
///
/// `open_source` is called twice and must return a stream over the same data
/// from the start each time. The first stream is opened before the chip is
/// erased, so a missing source leaves the chip untouched.
pub fn flash<P, S, F>(bus: &mut BusController<P>, mut open_source: F, status: &mut dyn StatusSink) -> crate::AResult<FlashReport>
where
	P: PinDriver,
	S: SourceStream,
	F: FnMut() -> crate::AResult<S>,
{
	let mut source = open_source()?;

	erase_chip(bus, status)?;
	let erase = verify_erased(bus, status)?;
	if !erase.is_ok() {
		warn!("chip not erased ({} bytes not 0xff), not programming", erase.errors());
		return Ok(FlashReport {
			erase,
			written: 0,
			verify: None,
		});
	}

	let written = program(bus, &mut source, status)?;
	drop(source);

	let mut source = open_source()?;
	let verify = verify_against_source(bus, &mut source, status)?;
	if verify.end != written {
		warn!("verified {} bytes, but wrote {}", verify.end, written);
	}

	Ok(FlashReport {
		erase,
		written,
		verify: Some(verify),
	})
}
