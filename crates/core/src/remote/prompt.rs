use serde_json::{json, Value};

/// Fixed instruction sent alongside the PDF.
pub const EXTRACTION_INSTRUCTION: &str = "\
You are an exam digitization assistant. The attached PDF is a question paper.
Extract every question it contains and answer with a JSON array only.

Rules:
- Output raw JSON only. No markdown fences. No explanations. No commentary.
- Each array element is an object with these fields:
  - \"id\": the question number as printed in the paper
  - \"section\": the section heading the question belongs to, or null
  - \"type\": one of \"MCQ\", \"MULTIMCQ\", \"INTEGER\", \"MATRIX\"
  - \"text\": the full question text, with formulas written in plain text or LaTeX
  - \"has_diagram\": true if the question relies on a figure or diagram
  - \"options\": array of { \"id\": \"A\" | \"B\" | ..., \"text\": string, \"is_correct\": bool }
  - \"correct_answer_value\": the numeric answer for INTEGER questions, otherwise null
  - \"explanation\": the worked solution if the paper includes one, otherwise null
- Use \"MULTIMCQ\" when more than one option is correct.
- Mark \"is_correct\" only when the paper states the answer; otherwise false.
- Keep the questions in the order they appear in the document.";

/// Build a `generateContent` request body carrying the whole PDF inline.
///
/// `pdf_base64` must already be standard base64 (with padding).
pub fn build_request_body(pdf_base64: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                {
                    "inline_data": {
                        "mime_type": "application/pdf",
                        "data": pdf_base64,
                    }
                },
                { "text": EXTRACTION_INSTRUCTION }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json"
        }
    })
}
