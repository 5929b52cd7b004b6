mod config;
mod context;
mod notes;
mod postprocess;
mod prompts;
mod restyler;
mod trace;

pub use config::{init_default_config, ConfigOverrides, PipelineConfig};
pub use context::{
    CancelToken, HistoryEntry, NoopObserver, Role, RunContext, RunObserver, RunStatus,
};
pub use notes::{generate_notes, notes_temperature};
pub use postprocess::postprocess_line;
pub use prompts::{
    build_notes_prompt, build_user_prompt, expected_prefix, notes_instructions, persona_names,
    persona_preset, DEFAULT_NOTES_PRESET, DEFAULT_PERSONA,
};
pub use restyler::{BatchSelection, Restyler, VerseSelection};
pub use trace::TraceWriter;
