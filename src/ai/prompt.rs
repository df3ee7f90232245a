//! 抽出指示（システムプロンプト）の組み立て

/// プロンプトに埋め込む設定値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSettings {
    /// 自社名（相手方として返さないよう指示する）
    pub my_company_name: Option<String>,
    /// 受取請求書のラベル
    pub incoming_invoice: String,
    /// 発行請求書のラベル
    pub outgoing_invoice: String,
    /// その他の文書の要約に使う言語
    pub output_language: String,
    /// 末尾に追加する自由記述
    pub prompt_extension: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            my_company_name: None,
            incoming_invoice: "ER".to_string(),
            outgoing_invoice: "AR".to_string(),
            output_language: "German".to_string(),
            prompt_extension: String::new(),
        }
    }
}

/// 設定からシステムプロンプトを生成（同じ設定なら常に同じ文字列）
pub fn build_prompt(settings: &PromptSettings) -> String {
    let mut txt = String::new();

    txt.push_str(
        "You will extract the company name, document date, and document type from the following PDF text. ",
    );
    txt.push_str(
        "Due to the nature of OCR text detection, the text will be very noisy and might contain \
         spelling and detection errors, handle those as good as possible.\n\n",
    );

    txt.push_str(
        "document_date: Find the most appropriate date (e.g. the invoice date) and assume the correct \
         date format according to the language and location of the document. \
         Return format must be: dd.mm.YYYY\n\n",
    );

    txt.push_str("company_name: Find the name of the company that is the corresponding party of the document. ");
    if let Some(name) = settings.my_company_name.as_deref().filter(|n| !n.trim().is_empty()) {
        txt.push_str(&format!(
            "My company name is: \"{}\", avoid using my company name as company_name in the response. ",
            name.trim()
        ));
    }
    txt.push_str(
        "For the company_name you always strip the legal form (e.U., SARL, GmbH, AG, Ltd, Limited, Inc. etc.)\n\n",
    );

    txt.push_str("document_type: Find the best matching type of the document. Valid document types are: ");
    txt.push_str(&format!(
        "For incoming invoices (invoices my company receives) use the term '{}' only, nothing more. ",
        settings.incoming_invoice
    ));
    txt.push_str(&format!(
        "For outgoing invoices (invoices my company sends) use the term '{}' only, nothing more. ",
        settings.outgoing_invoice
    ));
    txt.push_str(&format!(
        "For all other document types, always find a short descriptive summary/subject in {} language.\n\n",
        settings.output_language
    ));

    txt.push_str("If a value is not found, leave it empty. Do not guess.\n\n");

    txt.push_str(
        "Output: a single JSON object with exactly the keys company_name, document_date, document_type. \
         No additional text, no explanations and no code fences. \
         Strip everything from the response except the JSON object.",
    );

    let extension = settings.prompt_extension.trim();
    if !extension.is_empty() {
        txt.push(' ');
        txt.push_str(extension);
    }

    txt.trim().to_string()
}

/// 抽出対象テキストを包むユーザーメッセージ
pub fn user_message(text: &str) -> String {
    format!("Extract the information from the text:\n\n{}", text)
}
