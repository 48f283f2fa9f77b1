use std::fs;
use std::io::{
	self,
	Read,
};
use std::path::Path;

/// bytes per chunk pulled from a source
pub const CHUNK_SIZE: usize = 1024;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Chunk<'a> {
	pub data: &'a [u8],
	/// no data follows this chunk
	pub is_final: bool,
}

pub trait SourceStream {
	fn next_chunk(&mut self) -> crate::AResult<Chunk<'_>>;
}

impl<'a, S: ?Sized + SourceStream> SourceStream for &'a mut S {
	fn next_chunk(&mut self) -> crate::AResult<Chunk<'_>> {
		S::next_chunk(*self)
	}
}

/// Chunks from an `io::Read`.
///
/// Reads one byte ahead after a full chunk, so a source that is an exact
/// multiple of the chunk size still marks its last chunk final.
pub struct ReaderSource<R: Read> {
	reader: R,
	buf: Vec<u8>,
	lookahead: Option<u8>,
	done: bool,
}

impl<R: Read> ReaderSource<R> {
	pub fn new(reader: R, chunk_size: usize) -> Self {
		assert!(chunk_size > 0);
		ReaderSource {
			reader,
			buf: vec![0u8; chunk_size],
			lookahead: None,
			done: false,
		}
	}

	pub fn into_inner(self) -> R {
		self.reader
	}

	// like read_exact, but a short read at EOF is fine
	fn fill(&mut self, start: usize) -> io::Result<usize> {
		let mut filled = start;
		while filled < self.buf.len() {
			match self.reader.read(&mut self.buf[filled..]) {
				Ok(0) => break,
				Ok(n) => filled += n,
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => (),
				Err(e) => return Err(e),
			}
		}
		Ok(filled)
	}

	fn read_lookahead(&mut self) -> io::Result<Option<u8>> {
		let mut byte = [0u8];
		loop {
			match self.reader.read(&mut byte) {
				Ok(0) => return Ok(None),
				Ok(_) => return Ok(Some(byte[0])),
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => (),
				Err(e) => return Err(e),
			}
		}
	}
}

impl<R: Read> SourceStream for ReaderSource<R> {
	fn next_chunk(&mut self) -> crate::AResult<Chunk<'_>> {
		if self.done {
			return Ok(Chunk { data: &[], is_final: true });
		}

		let mut start = 0;
		if let Some(byte) = self.lookahead.take() {
			self.buf[0] = byte;
			start = 1;
		}
		let filled = self.fill(start)?;

		if filled == self.buf.len() {
			self.lookahead = self.read_lookahead()?;
			self.done = self.lookahead.is_none();
		} else {
			self.done = true;
		}

		Ok(Chunk {
			data: &self.buf[..filled],
			is_final: self.done,
		})
	}
}

pub fn open_file_source<P: AsRef<Path>>(path: P, chunk_size: usize) -> crate::AResult<ReaderSource<fs::File>> {
	let path = path.as_ref();
	let file = with_context!(("couldn't open source file {:?}", path), {
		Ok(fs::File::open(path)?)
	})?;
	debug!("opened source file {:?}", path);
	Ok(ReaderSource::new(file, chunk_size))
}

/// chunks of an in-memory buffer
pub struct SliceSource<'a> {
	data: &'a [u8],
	chunk_size: usize,
	pos: usize,
	chunks: usize,
}

impl<'a> SliceSource<'a> {
	pub fn new(data: &'a [u8], chunk_size: usize) -> Self {
		assert!(chunk_size > 0);
		SliceSource {
			data,
			chunk_size,
			pos: 0,
			chunks: 0,
		}
	}

	/// how often `next_chunk` was called
	pub fn chunks_served(&self) -> usize {
		self.chunks
	}
}

impl<'a> SourceStream for SliceSource<'a> {
	fn next_chunk(&mut self) -> crate::AResult<Chunk<'_>> {
		self.chunks += 1;
		let end = std::cmp::min(self.pos + self.chunk_size, self.data.len());
		let data = &self.data[self.pos..end];
		self.pos = end;
		Ok(Chunk {
			data,
			is_final: end == self.data.len(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn collect<S: SourceStream>(mut source: S) -> (Vec<u8>, usize) {
		let mut out = Vec::new();
		let mut chunks = 0;
		loop {
			let chunk = source.next_chunk().unwrap();
			chunks += 1;
			out.extend_from_slice(chunk.data);
			if chunk.is_final {
				return (out, chunks);
			}
		}
	}

	#[test]
	fn exact_multiple_ends_on_last_full_chunk() {
		let data = vec![0x5a; 2048];
		let (out, chunks) = collect(ReaderSource::new(io::Cursor::new(&data), 1024));
		assert_eq!(out, data);
		assert_eq!(chunks, 2);

		let (out, chunks) = collect(SliceSource::new(&data, 1024));
		assert_eq!(out, data);
		assert_eq!(chunks, 2);
	}

	#[test]
	fn short_tail_chunk() {
		let data: Vec<u8> = (0..2500u32).map(|i| i as u8).collect();
		let (out, chunks) = collect(ReaderSource::new(io::Cursor::new(&data), 1024));
		assert_eq!(out, data);
		assert_eq!(chunks, 3);
	}

	#[test]
	fn empty_source() {
		let (out, chunks) = collect(ReaderSource::new(io::empty(), 1024));
		assert!(out.is_empty());
		assert_eq!(chunks, 1);
		let (out, chunks) = collect(SliceSource::new(&[], 16));
		assert!(out.is_empty());
		assert_eq!(chunks, 1);
	}

	// hands out at most 7 bytes per read call
	struct Trickle<'a>(&'a [u8]);

	impl<'a> Read for Trickle<'a> {
		fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
			let n = std::cmp::min(std::cmp::min(7, buf.len()), self.0.len());
			buf[..n].copy_from_slice(&self.0[..n]);
			self.0 = &self.0[n..];
			Ok(n)
		}
	}

	#[test]
	fn short_reads_fill_chunks() {
		let data: Vec<u8> = (0..100u8).collect();
		let mut source = ReaderSource::new(Trickle(&data), 32);
		let chunk = source.next_chunk().unwrap();
		assert_eq!(chunk.data, &data[..32]);
		assert!(!chunk.is_final);
		let (rest, _) = collect(source);
		assert_eq!(rest, &data[32..]);
	}

	#[test]
	fn read_after_end_stays_final() {
		let mut source = ReaderSource::new(io::Cursor::new(vec![1u8, 2, 3]), 8);
		assert!(source.next_chunk().unwrap().is_final);
		let chunk = source.next_chunk().unwrap();
		assert!(chunk.is_final);
		assert!(chunk.data.is_empty());
	}

	#[test]
	fn missing_file() {
		let err = open_file_source("/nonexistent/rom.bin", CHUNK_SIZE).err().unwrap();
		assert!(err.to_string().contains("rom.bin"));
	}
}
