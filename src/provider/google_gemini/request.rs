use super::types::{
    GeminiGenerateContentRequest, GeminiSystemInstruction, GeminiSystemPart, GeminiTurn,
};

/// 构建 Google Gemini GenerateContent 请求体
///
/// 模型名称通过路径参数携带：`POST /v1beta/models/{model}:generateContent`，
/// 因此不会出现在 body 中。system instruction 为空时整个字段省略，而不是发送空字符串。
pub(crate) fn build_gemini_body<'a>(
    contents: &'a [GeminiTurn],
    system_instruction: Option<&'a str>,
) -> GeminiGenerateContentRequest<'a> {
    GeminiGenerateContentRequest {
        contents,
        system_instruction: system_instruction
            .filter(|text| !text.is_empty())
            .map(|text| GeminiSystemInstruction {
                parts: [GeminiSystemPart { text }],
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_with_system_instruction() {
        let contents = vec![
            GeminiTurn::user("hi"),
            GeminiTurn::model("hello"),
            GeminiTurn::user("capital of france?"),
        ];

        let body = serde_json::to_value(build_gemini_body(&contents, Some("be brief")))
            .expect("serialize");

        assert_eq!(
            body,
            json!({
                "contents": [
                    { "role": "user", "parts": [ { "text": "hi" } ] },
                    { "role": "model", "parts": [ { "text": "hello" } ] },
                    { "role": "user", "parts": [ { "text": "capital of france?" } ] }
                ],
                "system_instruction": { "parts": [ { "text": "be brief" } ] }
            })
        );
    }

    /// 空的 system instruction 不出现在请求体中
    #[test]
    fn empty_system_instruction_is_omitted() {
        let contents = vec![GeminiTurn::user("hi")];

        for system in [None, Some("")] {
            let body =
                serde_json::to_value(build_gemini_body(&contents, system)).expect("serialize");
            assert!(body.get("system_instruction").is_none(), "{body}");
        }
    }
}
