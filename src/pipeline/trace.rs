use std::path::PathBuf;

use anyhow::Context;

/// Optional dump of every prompt, raw reply and final line, one file each.
pub struct TraceWriter {
    dir: PathBuf,
    enabled: bool,
}

impl TraceWriter {
    pub fn new(dir: PathBuf, enabled: bool) -> anyhow::Result<Self> {
        if enabled {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create trace dir: {}", dir.display()))?;
        }
        Ok(Self { dir, enabled })
    }

    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn write_named_text(&self, name: &str, text: &str) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.dir.join(sanitize_filename(name));
        std::fs::write(&path, text).with_context(|| format!("write trace: {}", path.display()))?;
        Ok(())
    }

    pub fn write_verse_text(
        &self,
        seq: usize,
        reference: &str,
        stage: &str,
        kind: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let name = format!("{seq:06}_{reference}.{stage}.{kind}.txt");
        self.write_named_text(&name, text)
    }
}

fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            ' ' => out.push('_'),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verse_files_get_safe_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let trace_dir = dir.path().join("_trace");
        let trace = TraceWriter::new(trace_dir.clone(), true).expect("trace");
        trace
            .write_verse_text(3, "Genesis 1:3", "draft", "raw", "hello")
            .expect("write");
        let path = trace_dir.join("000003_Genesis_1_3.draft.raw.txt");
        assert_eq!(std::fs::read_to_string(path).expect("read"), "hello");
    }

    #[test]
    fn disabled_writer_touches_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("never");
        let trace = TraceWriter::new(target.clone(), false).expect("trace");
        trace.write_named_text("x.txt", "y").expect("noop");
        assert!(!target.exists());
        TraceWriter::disabled()
            .write_verse_text(1, "Genesis 1:1", "draft", "raw", "y")
            .expect("noop");
    }
}
