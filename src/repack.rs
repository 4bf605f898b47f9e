//! C4: slices the source blob into a single dense output blob ordered by the
//! reindexed buffer-view array, and collapses the asset down to one `Buffer`.

use crate::error::{ChunkerError, Result};
use tilechunk_json::validation::USize64;
use tilechunk_json::{Buffer, Index, Root};

/// Rewrites `root.buffer_views` in place to point at a single freshly built
/// blob and replaces `root.buffers` with the one `Buffer` describing it.
/// Returns the blob. `root` must already have been reindexed (C3) so its
/// buffer views are dense and 0-based; `source_blob` is the chunk's parent
/// model's original GLB binary chunk.
pub fn repack(source_blob: &[u8], root: &mut Root) -> Result<Vec<u8>> {
    let mut output_blob = Vec::new();

    for view in &mut root.buffer_views {
        let offset = view.byte_offset.map(|o| o.value()).unwrap_or(0);
        let length = view.byte_length.value();
        let end = offset.checked_add(length).ok_or_else(|| {
            ChunkerError::invalid_reference("buffer view byte range overflows usize")
        })?;
        let slice = source_blob.get(offset..end).ok_or_else(|| {
            ChunkerError::invalid_reference(format!(
                "buffer view range {}..{} exceeds source blob of {} bytes",
                offset,
                end,
                source_blob.len()
            ))
        })?;

        let new_offset = output_blob.len();
        output_blob.extend_from_slice(slice);

        view.buffer = Index::new(0);
        view.byte_offset = Some(USize64::from(new_offset));
    }

    root.buffers = vec![Buffer {
        byte_length: USize64::from(output_blob.len()),
        #[cfg(feature = "names")]
        name: None,
        uri: None,
        extensions: None,
        extras: Default::default(),
    }];

    Ok(output_blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilechunk_json::buffer::View;

    fn view(buffer: u32, offset: usize, length: usize) -> View {
        View {
            buffer: Index::new(buffer),
            byte_length: USize64::from(length),
            byte_offset: Some(USize64::from(offset)),
            byte_stride: None,
            #[cfg(feature = "names")]
            name: None,
            target: None,
            extensions: None,
            extras: Default::default(),
        }
    }

    #[test]
    fn repack_concatenates_slices_in_view_order() {
        let source = (0u8..32).collect::<Vec<u8>>();
        let mut root = Root {
            buffer_views: vec![view(0, 16, 8), view(0, 0, 4)],
            ..Default::default()
        };

        let blob = repack(&source, &mut root).unwrap();

        assert_eq!(blob, &source[16..24].iter().chain(&source[0..4]).copied().collect::<Vec<u8>>());
        assert_eq!(root.buffer_views[0].byte_offset.unwrap().value(), 0);
        assert_eq!(root.buffer_views[1].byte_offset.unwrap().value(), 8);
        assert_eq!(root.buffers.len(), 1);
        assert_eq!(root.buffers[0].byte_length.value(), 12);
    }

    #[test]
    fn repack_rejects_out_of_range_view() {
        let source = vec![0u8; 4];
        let mut root = Root {
            buffer_views: vec![view(0, 0, 8)],
            ..Default::default()
        };
        assert!(repack(&source, &mut root).is_err());
    }
}
