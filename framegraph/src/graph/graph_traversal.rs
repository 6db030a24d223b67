use super::*;
use crate::{BakeError, BakeResult};
use fnv::{FnvHashMap, FnvHashSet};

/// Which passes read and write each attachment. Keyed by the attachment id the pass declared, so
/// a pass writing a proxy is not a writer of the proxy's parent.
#[derive(Default, Debug)]
pub(super) struct ReadWriteList {
    pub(super) readers: FnvHashMap<AttachmentId, Vec<FramePassId>>,
    pub(super) writers: FnvHashMap<AttachmentId, Vec<FramePassId>>,
}

impl ReadWriteList {
    pub(super) fn writers(
        &self,
        attachment_id: AttachmentId,
    ) -> &[FramePassId] {
        self.writers
            .get(&attachment_id)
            .map(|x| x.as_slice())
            .unwrap_or(&[])
    }
}

fn unique_push(
    list: &mut Vec<FramePassId>,
    pass_id: FramePassId,
) {
    if !list.contains(&pass_id) {
        list.push(pass_id);
    }
}

#[profiling::function]
pub(super) fn build_read_write_list(graph: &FrameGraph) -> ReadWriteList {
    let mut read_write_list = ReadWriteList::default();

    for pass in &graph.passes {
        let inputs = pass
            .inputs()
            .iter()
            .chain(pass.depth_stencil_input().into_iter());
        for input in inputs {
            unique_push(
                read_write_list
                    .readers
                    .entry(input.attachment_id)
                    .or_default(),
                pass.id(),
            );
        }

        let outputs = pass
            .outputs()
            .iter()
            .chain(pass.depth_stencil_output().into_iter());
        for output in outputs {
            unique_push(
                read_write_list
                    .writers
                    .entry(output.attachment_id)
                    .or_default(),
                pass.id(),
            );
        }
    }

    read_write_list
}

// Recursively called to collect every pass that contributes to the seed pass. A pass is appended
// once all of its writers have been appended, so the list is a valid execution order. Passes that
// were already appended are not walked again.
//
// Dependencies are walked last to first. This keeps the order a pass would have if it were placed
// right before the first pass that needs it.
fn traverse_graph(
    graph: &FrameGraph,
    read_write_list: &ReadWriteList,
    pass_id: FramePassId,
    visiting: &mut FnvHashSet<FramePassId>,
    visiting_stack: &mut Vec<FramePassId>,
    visited: &mut FnvHashSet<FramePassId>,
    pass_list: &mut Vec<FramePassId>,
) -> BakeResult<()> {
    if visited.contains(&pass_id) {
        return Ok(());
    }

    // This pass is already being visited higher up in the stack, so it depends on itself
    if visiting.contains(&pass_id) {
        log::warn!(
            "Found cycle in frame graph at pass {:?} {:?}",
            pass_id,
            graph.pass(pass_id).name()
        );
        for visiting_pass in visiting_stack.iter() {
            log::warn!(
                "  Visiting {:?} {:?}",
                visiting_pass,
                graph.pass(*visiting_pass).name()
            );
        }
        return Err(BakeError::CyclicDependency(pass_id));
    }

    visiting.insert(pass_id);
    visiting_stack.push(pass_id);

    let pass = graph.pass(pass_id);
    let inputs = pass
        .inputs()
        .iter()
        .chain(pass.depth_stencil_input().into_iter())
        .rev();
    for input in inputs {
        for &writer in read_write_list.writers(input.attachment_id).iter().rev() {
            // A pass may read and write the same attachment (depth-stencil for example)
            if writer == pass_id {
                continue;
            }

            traverse_graph(
                graph,
                read_write_list,
                writer,
                visiting,
                visiting_stack,
                visited,
                pass_list,
            )?;
        }
    }

    visiting_stack.pop();
    visiting.remove(&pass_id);
    visited.insert(pass_id);
    pass_list.push(pass_id);
    Ok(())
}

// Passes could be moved apart here so that independent work overlaps better. The order coming out
// of the traversal is kept as-is for now.
fn reorder_passes(_pass_list: &mut Vec<FramePassId>) {}

/// Determine which passes run and in which order by walking backwards from the outputs. Passes
/// that contribute nothing to an output are culled.
#[profiling::function]
pub(super) fn determine_pass_order(
    graph: &FrameGraph,
    read_write_list: &ReadWriteList,
) -> BakeResult<Vec<FramePassId>> {
    if graph.outputs.is_empty() {
        return Err(BakeError::NoOutput);
    }

    let mut visiting = FnvHashSet::default();
    let mut visiting_stack = Vec::default();
    let mut visited = FnvHashSet::default();
    let mut pass_list = Vec::default();

    for &output in &graph.outputs {
        if read_write_list.writers(output).is_empty() {
            return Err(BakeError::OutputNeverWritten(output));
        }
    }

    for &output in graph.outputs.iter().rev() {
        let writers = read_write_list.writers(output);

        for &writer in writers.iter().rev() {
            log::trace!(
                "Traversing from pass {:?} {:?} which writes output {:?}",
                writer,
                graph.pass(writer).name(),
                output
            );

            traverse_graph(
                graph,
                read_write_list,
                writer,
                &mut visiting,
                &mut visiting_stack,
                &mut visited,
                &mut pass_list,
            )?;
        }
    }

    reorder_passes(&mut pass_list);

    Ok(pass_list)
}
