//! Fixed-capacity record buffer.
//!
//! One arena of `slots × slot_size` bytes is allocated at start and never
//! resized.  Records are stored in arrival order, each in its own slot,
//! and are emitted as a JSON array `[r0,r1,…]` for upload.
//!
//! The buffer is owned by the uploader and never touched from interrupt
//! context.

use log::{debug, warn};

use crate::error::BufferError;

pub struct BatchBuffer {
    arena: Box<[u8]>,
    lens: Box<[u16]>,
    slot_size: usize,
    len: usize,
}

impl BatchBuffer {
    /// Allocate `slots` slots of `slot_size` bytes each.
    ///
    /// `slot_size` is capped at `u16::MAX`.  Config validation bounds both
    /// the slot size and the whole arena before this is reached.
    pub fn new(slots: usize, slot_size: usize) -> Self {
        let slot_size = slot_size.min(usize::from(u16::MAX));
        Self {
            arena: vec![0u8; slots * slot_size].into_boxed_slice(),
            lens: vec![0u16; slots].into_boxed_slice(),
            slot_size,
            len: 0,
        }
    }

    /// Copy `record` into the next free slot.
    pub fn append(&mut self, record: &[u8]) -> Result<(), BufferError> {
        if record.len() > self.slot_size {
            warn!(
                "BatchBuffer: {}B record exceeds {}B slot, dropped",
                record.len(),
                self.slot_size
            );
            return Err(BufferError::RecordTooLarge {
                len: record.len(),
                slot_size: self.slot_size,
            });
        }
        if self.len == self.capacity() {
            return Err(BufferError::Full);
        }
        let start = self.len * self.slot_size;
        self.arena[start..start + record.len()].copy_from_slice(record);
        self.lens[self.len] = record.len() as u16;
        self.len += 1;
        debug!("BatchBuffer: {}/{}", self.len, self.capacity());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.lens.len()
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Stored records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.len).map(move |i| {
            let start = i * self.slot_size;
            &self.arena[start..start + usize::from(self.lens[i])]
        })
    }

    /// Exact size of the JSON array produced by [`write_json_array`].
    ///
    /// [`write_json_array`]: Self::write_json_array
    pub fn json_array_len(&self) -> usize {
        let payload: usize = self.lens[..self.len].iter().map(|&l| usize::from(l)).sum();
        let separators = self.len.saturating_sub(1);
        payload + separators + 2
    }

    /// Stream `[r0,r1,…]` into `sink` without building it in memory.
    pub fn write_json_array<E>(
        &self,
        mut sink: impl FnMut(&[u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        sink(b"[")?;
        for (i, record) in self.records().enumerate() {
            if i > 0 {
                sink(b",")?;
            }
            sink(record)?;
        }
        sink(b"]")
    }

    /// The JSON array as an owned string, for logs and tests.
    pub fn render_as_json_array(&self) -> String {
        let mut out = Vec::with_capacity(self.json_array_len());
        let _ = self.write_json_array(|chunk| {
            out.extend_from_slice(chunk);
            Ok::<(), ()>(())
        });
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Forget every record.  Slot memory is not zeroed.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}
