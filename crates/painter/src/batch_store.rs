use render_protocol::{BatchIdentity, VertexBatchId};
use slotmap::SlotMap;

/// CPU-side backing storage for every vertex batch.
///
/// Batches outlive frames; their buffers are rewound (never freed) at frame
/// start. The first replay pass fills `written` slots sequentially, the
/// second pass consumes them through the `drawn` cursor so one batch can
/// produce several contiguous draw ranges per frame.
pub struct VertexBatchStore {
    batches: SlotMap<VertexBatchId, VertexBatch>,
}

struct VertexBatch {
    identity: BatchIdentity,
    stride: usize,
    bytes: Vec<u8>,
    written: u32,
    drawn: u32,
}

impl VertexBatchStore {
    pub fn new() -> Self {
        Self {
            batches: SlotMap::with_key(),
        }
    }

    pub fn create_batch(&mut self, identity: BatchIdentity, stride: usize) -> VertexBatchId {
        assert!(stride > 0, "vertex batch stride must be at least 1 byte");
        self.batches.insert(VertexBatch {
            identity,
            stride,
            bytes: Vec::new(),
            written: 0,
            drawn: 0,
        })
    }

    pub fn identity(&self, batch: VertexBatchId) -> BatchIdentity {
        self.batch(batch).identity
    }

    pub fn stride(&self, batch: VertexBatchId) -> usize {
        self.batch(batch).stride
    }

    /// Rewinds every batch's write and draw cursors. Buffer capacity is kept.
    pub fn begin_frame(&mut self) {
        for batch in self.batches.values_mut() {
            batch.written = 0;
            batch.drawn = 0;
        }
    }

    /// Writes one vertex into the next sequential slot and returns its index.
    pub fn write_next(&mut self, batch_id: VertexBatchId, vertex: &[u8]) -> u32 {
        let batch = self.batch_mut(batch_id);
        assert_eq!(
            vertex.len(),
            batch.stride,
            "vertex is {} bytes but batch stride is {}",
            vertex.len(),
            batch.stride
        );
        let index = batch.written;
        let offset = index as usize * batch.stride;
        let end = offset + batch.stride;
        if batch.bytes.len() < end {
            batch.bytes.resize(end, 0);
        }
        batch.bytes[offset..end].copy_from_slice(vertex);
        batch.written = batch
            .written
            .checked_add(1)
            .unwrap_or_else(|| panic!("vertex batch slot index overflow"));
        index
    }

    pub fn written_count(&self, batch: VertexBatchId) -> u32 {
        self.batch(batch).written
    }

    /// Bytes written this frame, in slot order.
    pub fn frame_bytes(&self, batch: VertexBatchId) -> &[u8] {
        let batch = self.batch(batch);
        &batch.bytes[..batch.written as usize * batch.stride]
    }

    /// Batches that received vertices this frame, for the upload step.
    pub fn written_batches(&self) -> impl Iterator<Item = (VertexBatchId, &[u8])> {
        self.batches.iter().filter(|(_, batch)| batch.written > 0).map(
            |(id, batch)| (id, &batch.bytes[..batch.written as usize * batch.stride]),
        )
    }

    pub fn drawn_cursor(&self, batch: VertexBatchId) -> u32 {
        self.batch(batch).drawn
    }

    pub fn advance_drawn(&mut self, batch_id: VertexBatchId, count: u32) {
        let batch = self.batch_mut(batch_id);
        let drawn = batch
            .drawn
            .checked_add(count)
            .unwrap_or_else(|| panic!("vertex batch draw cursor overflow"));
        assert!(
            drawn <= batch.written,
            "draw cursor {} would pass the {} vertices written this frame",
            drawn,
            batch.written
        );
        batch.drawn = drawn;
    }

    pub fn remove_batch(&mut self, batch: VertexBatchId) {
        self.batches
            .remove(batch)
            .unwrap_or_else(|| panic!("remove of unknown vertex batch"));
    }

    fn batch(&self, id: VertexBatchId) -> &VertexBatch {
        self.batches
            .get(id)
            .unwrap_or_else(|| panic!("unknown vertex batch id"))
    }

    fn batch_mut(&mut self, id: VertexBatchId) -> &mut VertexBatch {
        self.batches
            .get_mut(id)
            .unwrap_or_else(|| panic!("unknown vertex batch id"))
    }
}

impl Default for VertexBatchStore {
    fn default() -> Self {
        Self::new()
    }
}
