//! Domain field keys in the extra channel.
//!
//! Each agent owns a disjoint subset; handoffs may propagate any of them
//! into the target agent's view. Key ownership: the math specialist
//! holds expression/result, the weather specialist holds location/
//! temperature/conditions, process-search holds the case/docket/web
//! fields, the RAG pipeline holds the `rag_*` keys, and the human gate
//! holds `human_response`.

pub const MATH_EXPRESSION: &str = "math_expression";
pub const MATH_RESULT: &str = "math_result";

pub const LOCATION: &str = "location";
pub const TEMPERATURE: &str = "temperature";
pub const CONDITIONS: &str = "conditions";

pub const CASE_NUMBER: &str = "case_number";
pub const CASE_RECORD: &str = "case_record";
pub const DOCKET_NUMBER: &str = "docket_number";
pub const DOCKET_RECORD: &str = "docket_record";
pub const WEB_RESULTS: &str = "web_results";
pub const WEB_SUMMARY: &str = "web_summary";

pub const HUMAN_RESPONSE: &str = "human_response";

pub const RAG_STATE: &str = "rag_state";
pub const RAG_RESPONSE: &str = "rag_response";
pub const CITATIONS: &str = "citations";
pub const QUALITY_SCORE: &str = "quality_score";
pub const SOURCE_REFS: &str = "source_refs";
pub const SEEN_DOCUMENTS: &str = "seen_documents";
