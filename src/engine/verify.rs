use crate::bus::BusController;
use crate::chip::{
	Address,
	ERASED,
};
use crate::pins::PinDriver;
use crate::source::SourceStream;
use crate::status::StatusSink;

use super::{
	Mismatch,
	VerificationResult,
	check_address,
	next_chunk,
};

fn record_mismatch(result: &mut VerificationResult, mismatch: Mismatch, status: &mut dyn StatusSink) {
	status.report(&[
		"Error! Byte mismatch",
		&format!("Address: 0x{:05X}", mismatch.address),
		&format!("Expected: 0x{:02X}", mismatch.expected),
		&format!("Actual: 0x{:02X}", mismatch.actual),
	]);
	result.mismatches.push(mismatch);
}

fn report_done(result: &VerificationResult, status: &mut dyn StatusSink) {
	if result.is_ok() {
		info!("verified {} bytes", result.end);
	} else {
		warn!("verified {} bytes, {} mismatches", result.end, result.errors());
	}
	status.report(&[
		"Done reading EEPROM!",
		&format!("Addrs: 0x{:05X}", result.end),
		&format!("Num errors: {}", result.errors()),
	]);
}

/// compare chip contents from address 0 against the source
///
/// Every byte of the source is checked; mismatches are collected, not fatal.
pub fn verify_against_source<P, S>(bus: &mut BusController<P>, source: &mut S, status: &mut dyn StatusSink) -> crate::AResult<VerificationResult>
where
	P: PinDriver,
	S: SourceStream + ?Sized,
{
	status.report(&["Reading file", "from EEPROM", "now..."]);
	bus.enter_read_mode()?;

	let mut result = VerificationResult::default();
	let mut cursor: Address = 0;
	loop {
		let chunk = next_chunk(source, cursor, status)?;
		for &expected in chunk.data {
			check_address(bus, cursor)?;
			let actual = bus.read_byte(cursor)?;
			if actual != expected {
				record_mismatch(&mut result, Mismatch { address: cursor, expected, actual }, status);
			}
			cursor += 1;
		}
		if chunk.is_final || chunk.data.is_empty() {
			break;
		}
	}

	result.end = cursor;
	report_done(&result, status);
	Ok(result)
}

/// check every address of the chip reads 0xff
pub fn verify_erased<P: PinDriver>(bus: &mut BusController<P>, status: &mut dyn StatusSink) -> crate::AResult<VerificationResult> {
	status.report(&["Verifying", "EEPROM is", "erased now..."]);
	bus.enter_read_mode()?;

	let size: Address = 1 << bus.address_lines();
	let mut result = VerificationResult::default();
	for address in 0..size {
		let actual = bus.read_byte(address)?;
		if actual != ERASED {
			record_mismatch(&mut result, Mismatch { address, expected: ERASED, actual }, status);
		}
	}

	result.end = size;
	report_done(&result, status);
	Ok(result)
}
