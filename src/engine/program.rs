use crate::bus::BusController;
use crate::chip::{
	Address,
	CommandSequencer,
};
use crate::pins::PinDriver;
use crate::source::SourceStream;
use crate::status::StatusSink;

use super::{
	check_address,
	next_chunk,
};

/// program the source from address 0 up; returns the address after the last
/// byte written
///
/// The chip must be erased: programming only clears bits. Run a verify
/// afterwards, a failed byte program gives no sign of it here.
///
/// A source longer than the chip fails with `AddressOverflow` once every
/// address has been written; a source failure stops with
/// `SourceInterrupted`. Neither undoes what was written.
pub fn program<P, S>(bus: &mut BusController<P>, source: &mut S, status: &mut dyn StatusSink) -> crate::AResult<Address>
where
	P: PinDriver,
	S: SourceStream + ?Sized,
{
	status.report(&["Writing File", "to EEPROM", "now..."]);
	bus.enter_write_mode()?;

	let mut cursor: Address = 0;
	loop {
		let chunk = next_chunk(source, cursor, status)?;
		for &byte in chunk.data {
			check_address(bus, cursor)?;
			bus.write_byte_unlocked(cursor, byte)?;
			cursor += 1;
		}
		debug!("programmed up to 0x{:05x}", cursor);
		if chunk.is_final || chunk.data.is_empty() {
			break;
		}
	}

	info!("programmed {} bytes", cursor);
	status.report(&["Done writing EEPROM!", "number of", &format!("Addrs: 0x{:05X}", cursor)]);
	Ok(cursor)
}
