//! Structured clone
//!
//! `clone_value` produces a structurally independent copy of a value.
//! ArrayBuffers, typed arrays and DataViews are copied directly; every other
//! value takes a round trip through the generic serializer. Buffers found
//! inside that round trip are routed back through the same [`CloneMemo`], so
//! two views over one source buffer come out sharing one cloned buffer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tern_vm_core::serializer::{ValueDeserializer, ValueSerializer};
use tern_vm_core::{
    HostBufferDelegate, IdentityWeakMap, JsArrayBuffer, JsDataView, JsTypedArray,
    SerializerConfig, Value, VmError, VmResult,
};

use crate::error::{WebError, WebResult};

const DETACHED_MESSAGE: &str = "An ArrayBuffer is detached and could not be cloned";

/// Source buffer to cloned buffer, for one clone operation.
///
/// Holds at most one clone per source buffer. Sources are held weakly;
/// clones are held strongly until the memo is dropped, which for
/// [`Cloner::clone_value`] is the end of the call.
#[derive(Debug, Default)]
pub struct CloneMemo {
    clones: IdentityWeakMap<JsArrayBuffer, Arc<JsArrayBuffer>>,
}

impl CloneMemo {
    /// Create an empty memo
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone previously made for `source`
    pub fn get(&self, source: &Arc<JsArrayBuffer>) -> Option<Arc<JsArrayBuffer>> {
        self.clones.get(source).cloned()
    }

    /// Number of buffers cloned so far
    pub fn len(&self) -> usize {
        self.clones.len()
    }

    /// Whether nothing has been cloned yet
    pub fn is_empty(&self) -> bool {
        self.clones.is_empty()
    }

    /// Return the clone of `source`, copying it on first use.
    /// `None` if the source is detached.
    fn get_or_clone(&mut self, source: &Arc<JsArrayBuffer>) -> Option<Arc<JsArrayBuffer>> {
        if let Some(existing) = self.clones.get(source) {
            tracing::trace!("structured clone: buffer memo hit");
            return Some(existing.clone());
        }
        let cloned = Arc::new(source.slice(0, source.byte_length())?);
        self.clones.insert(source, cloned.clone());
        Some(cloned)
    }
}

/// Copy `[byte_offset, byte_offset + byte_length)` of `source` into a new
/// buffer. The window is clamped to the source length.
pub fn clone_array_buffer(
    source: &JsArrayBuffer,
    byte_offset: usize,
    byte_length: usize,
) -> WebResult<JsArrayBuffer> {
    source
        .slice(byte_offset, byte_offset.saturating_add(byte_length))
        .ok_or_else(|| WebError::data_clone(DETACHED_MESSAGE))
}

/// Options for [`Cloner`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneOptions {
    /// Limits for the generic serializer path
    pub serializer: SerializerConfig,
}

/// Structured clone entry point
#[derive(Debug, Clone, Default)]
pub struct Cloner {
    options: CloneOptions,
}

impl Cloner {
    /// Create a cloner with `options`
    pub fn new(options: CloneOptions) -> Self {
        Self { options }
    }

    /// Set the nesting limit of the generic path
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.options.serializer.max_depth = max_depth;
        self
    }

    /// Active options
    pub fn options(&self) -> &CloneOptions {
        &self.options
    }

    /// Clone `value` with a memo scoped to this call
    pub fn clone_value(&self, value: &Value) -> WebResult<Value> {
        let mut memo = CloneMemo::new();
        self.clone_value_with_memo(value, &mut memo)
    }

    /// Clone `value`, sharing buffer clones through `memo`
    pub fn clone_value_with_memo(&self, value: &Value, memo: &mut CloneMemo) -> WebResult<Value> {
        match value {
            Value::ArrayBuffer(buffer) => {
                tracing::trace!(len = buffer.byte_length(), "structured clone: ArrayBuffer fast path");
                let cloned = memo
                    .get_or_clone(buffer)
                    .ok_or_else(|| WebError::data_clone(DETACHED_MESSAGE))?;
                Ok(Value::array_buffer(cloned))
            }
            Value::TypedArray(view) => {
                tracing::trace!(kind = view.kind().name(), "structured clone: TypedArray fast path");
                let buffer = memo
                    .get_or_clone(view.buffer())
                    .ok_or_else(|| WebError::data_clone(DETACHED_MESSAGE))?;
                let cloned = JsTypedArray::new(buffer, view.kind(), view.byte_offset(), view.length())
                    .map_err(VmError::range_error)?;
                Ok(Value::typed_array(Arc::new(cloned)))
            }
            Value::DataView(view) => {
                tracing::trace!("structured clone: DataView fast path");
                let buffer = memo
                    .get_or_clone(view.buffer())
                    .ok_or_else(|| WebError::data_clone(DETACHED_MESSAGE))?;
                let cloned = JsDataView::new(buffer, view.byte_offset(), Some(view.byte_length()))
                    .map_err(VmError::range_error)?;
                Ok(Value::data_view(Arc::new(cloned)))
            }
            _ => self.clone_generic(value, memo),
        }
    }

    fn clone_generic(&self, value: &Value, memo: &mut CloneMemo) -> WebResult<Value> {
        let config = self.options.serializer;
        let mut delegate = MemoDelegate {
            memo,
            buffers: Vec::new(),
        };

        let mut serializer = ValueSerializer::new(config).with_delegate(&mut delegate);
        serializer.write_value(value).map_err(uncloneable)?;
        let bytes = serializer.finish();

        let mut deserializer = ValueDeserializer::new(&bytes, config).with_delegate(&mut delegate);
        deserializer.read_header()?;
        let cloned = deserializer.read_value()?;
        deserializer.finish()?;
        Ok(cloned)
    }
}

/// Clone `value` with default options
pub fn clone_value(value: &Value) -> WebResult<Value> {
    Cloner::default().clone_value(value)
}

/// Type mismatches become `DataCloneError`; everything else is kept as is.
fn uncloneable(err: VmError) -> WebError {
    if err.is_type_error() {
        tracing::debug!(error = %err, "structured clone: uncloneable value");
        WebError::data_clone("Uncloneable value")
    } else {
        err.into()
    }
}

/// Hands buffers met by the generic serializer to the clone memo
struct MemoDelegate<'m> {
    memo: &'m mut CloneMemo,
    buffers: Vec<Arc<JsArrayBuffer>>,
}

impl HostBufferDelegate for MemoDelegate<'_> {
    fn write_buffer(&mut self, buffer: &Arc<JsArrayBuffer>) -> VmResult<Option<u32>> {
        let cloned = self
            .memo
            .get_or_clone(buffer)
            .ok_or_else(|| VmError::type_error(DETACHED_MESSAGE))?;
        let id = u32::try_from(self.buffers.len())
            .map_err(|_| VmError::range_error("Too many buffers in cloned value"))?;
        self.buffers.push(cloned);
        Ok(Some(id))
    }

    fn read_buffer(&mut self, id: u32) -> VmResult<Arc<JsArrayBuffer>> {
        self.buffers
            .get(id as usize)
            .cloned()
            .ok_or_else(|| VmError::internal("Unable to deserialize cloned data"))
    }
}
