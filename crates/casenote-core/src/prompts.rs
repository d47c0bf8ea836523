//! Prompt texts for the narrative and atomic-fact batch jobs.

/// Instruction for turning a diarized bodycam transcript into the
/// "Narrative" section of a police report.
pub const NARRATIVE_INSTRUCTION: &str = "Using the provided body-worn camera audio transcript, \
write the \"Narrative\" section of a police report from my perspective. Begin with \"Narrative:\" \
and write 1-4 paragraphs in first-person past tense. The narrative must follow a chronological \
sequence of events of the incident at hand. Clearly and accurately identify and describe all key \
individuals involved (e.g., suspect, victim, witnesses, and officer) and describe what each party \
did, in sequence. Explain how and why the incident occurred to the extent supported by the audio. \
The narrative must accurately document whether Miranda or other legal warnings were provided if \
present in the transcript, whether the individual complied, resisted, or fled, any searches or \
investigative actions taken, any use of force, how evidence was collected or stored, and whether \
the basis for probable cause, citation, or arrest was stated if this information is present in \
the transcript. If this information is not present in the transcript, do not include it in the \
output report, and do not note that it was not included in the transcript. Use only information \
explicitly present in the audio transcript. If any required detail is missing, unclear, or not \
audible, insert an inline placeholder in the form [INSERT: specific missing detail]. The output \
must be a single, continuous narrative with no bullet points, headings, analysis, or refusal \
language. Do not include details that do not pertain to the incident which the police report is \
being written about.";

/// Instruction for decomposing a report narrative into atomic facts.
pub const ATOMIC_FACTS_INSTRUCTION: &str = "You are an information extraction assistant. Your \
task is to decompose a police report into atomic fact sentences.\n\
Definition:\n\
An atomic fact is a short, self-contained sentence that conveys exactly one piece of verifiable \
information from the report - no interpretation, inference, or combination of multiple facts.\n\
Instructions:\n\
Use only the information explicitly stated in the report.\n\n\
Maintain first-person perspective when the officer is speaking (e.g., \"I arrived at the \
scene.\").\n\n\
Do not include times, names, or locations unless explicitly given. If placeholders are used in \
the text (e.g., [INSERT: name of driver]), keep them as-is.\n\n\
Each fact should be one simple, declarative sentence.\n\n\
Output only the atomic fact sentences, one per line, with no numbering or extra commentary.";

/// Full prompt for one narrative request: instruction plus raw transcript JSON.
pub fn narrative_prompt(transcript_json: &str) -> String {
    format!("{NARRATIVE_INSTRUCTION}\n\nTranscript (JSON):\n{transcript_json}")
}

/// Full prompt for one atomic-facts request: instruction plus report text.
pub fn atomic_facts_prompt(report: &str) -> String {
    format!("{ATOMIC_FACTS_INSTRUCTION}\n\nReport:\n{report}")
}
