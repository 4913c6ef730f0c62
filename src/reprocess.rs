use crate::ndjson::{for_each_line, parse_record, NdjsonWriter};
use crate::progress::make_count_spinner;
use crate::record::prune_keys;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

fn tmp_path_for(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".reprocess-{}.tmp", std::process::id()));
    output.with_file_name(name)
}

/// Re-apply the field pruning policy to every record of `input` and write the
/// result to `output` as a new store. `created_at` is left as stored.
///
/// The output is assembled in a temp file next to `output` and promoted at the
/// end, so `input == output` is allowed and a failed run leaves `output` alone.
/// Returns the number of records written.
pub fn reprocess(input: &Path, output: &Path, buf_bytes: usize, progress: bool) -> Result<u64> {
    let tmp = tmp_path_for(output);
    let mut w = NdjsonWriter::create(&tmp, buf_bytes).with_context(|| format!("create {}", tmp.display()))?;
    let pb = progress.then(|| make_count_spinner("Reprocessing"));
    let mut written = 0u64;

    let res = for_each_line(input, buf_bytes, |line_no, line| {
        let rec = parse_record(line).with_context(|| format!("{} line {}", input.display(), line_no))?;
        w.write_record(&prune_keys(rec))?;
        written += 1;
        if let Some(pb) = &pb {
            pb.inc(1);
        }
        Ok(())
    });
    if let Err(e) = res {
        drop(w);
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    if let Err(e) = w.finish_atomic(output) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    if let Some(pb) = pb {
        pb.finish_with_message("Reprocessed");
    }
    tracing::info!("Reprocessed {} records from {} into {}", written, input.display(), output.display());
    Ok(written)
}
