//! 通用套话识别与按类别补全文案
//!
//! 纯函数规则表：判断解释/建议是否是没有信息量的占位文字，
//! 并根据风险标题的关键词生成具体的替代文案。

/// 被视为套话的建议片段（小写，子串匹配）
const GENERIC_RECOMMENDATIONS: &[&str] = &[
    "review this clause with a legal professional",
    "consult with a legal professional",
    "seek legal advice",
    "contact a lawyer",
    "review this clause",
    "consult a legal professional",
];

/// 被视为套话的解释片段（小写，子串匹配）
const GENERIC_EXPLANATIONS: &[&str] = &[
    "no explanation provided",
    "explanation not provided",
    "this clause requires attention",
    "review this clause",
    "consult a legal professional",
    "seek legal advice",
    "risk identified in document",
];

/// 解释的最短有效长度（字符数，去掉首尾空白后）
const MIN_EXPLANATION_CHARS: usize = 20;

/// 兜底解释中引用原文的最大字符数
const SNIPPET_PREVIEW_CHARS: usize = 100;

fn contains_any(text: &str, fragments: &[&str]) -> bool {
    let lower = text.to_lowercase();
    fragments.iter().any(|fragment| lower.contains(fragment))
}

/// 解释为空、过短或命中套话时返回 true
pub fn is_generic_explanation(explanation: &str) -> bool {
    let trimmed = explanation.trim();
    trimmed.chars().count() < MIN_EXPLANATION_CHARS || contains_any(trimmed, GENERIC_EXPLANATIONS)
}

/// 单条建议为空或命中套话时返回 true
pub fn is_generic_recommendation(recommendation: &str) -> bool {
    let trimmed = recommendation.trim();
    trimmed.is_empty() || contains_any(trimmed, GENERIC_RECOMMENDATIONS)
}

/// 按风险标题关键词划分的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskCategory {
    Termination,
    Liability,
    Penalty,
    Indemnification,
    Warranty,
    Confidentiality,
    GoverningLaw,
    Assignment,
    Notice,
    AutomaticRenewal,
    Other,
}

/// 关键词按顺序匹配，先命中的类别优先
const CATEGORY_KEYWORDS: &[(&[&str], RiskCategory)] = &[
    (&["termination"], RiskCategory::Termination),
    (&["liabilit"], RiskCategory::Liability),
    (&["penalt"], RiskCategory::Penalty),
    (&["indemnif"], RiskCategory::Indemnification),
    (&["warrant"], RiskCategory::Warranty),
    (&["confident"], RiskCategory::Confidentiality),
    (&["governing law", "jurisdiction"], RiskCategory::GoverningLaw),
    (&["assign"], RiskCategory::Assignment),
    (&["notice"], RiskCategory::Notice),
    (&["automatic"], RiskCategory::AutomaticRenewal),
];

impl RiskCategory {
    pub fn from_title(title: &str) -> Self {
        let lower = title.to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(_, category)| *category)
            .unwrap_or(RiskCategory::Other)
    }

    fn explanation(self) -> Option<&'static str> {
        let text = match self {
            RiskCategory::Termination => "This clause defines termination conditions and notice periods. Review the specific terms to understand when and how the contract can be ended, what notice is required, and whether termination rights are mutual or one-sided.",
            RiskCategory::Liability => "This clause addresses liability limitations or allocations. Such clauses can significantly impact your legal protection and financial exposure in case of disputes or damages.",
            RiskCategory::Penalty => "This clause outlines penalties or liquidated damages. Review the specific amounts, triggers, and whether they are reasonable and clearly defined.",
            RiskCategory::Indemnification => "This indemnity clause may require one party to compensate the other for losses. Indemnity provisions can be broad and may create unexpected financial obligations.",
            RiskCategory::Warranty => "This warranty clause defines what is guaranteed and what is not. Review the scope, duration, and any disclaimers that may limit your legal recourse.",
            RiskCategory::Confidentiality => "This confidentiality clause governs how sensitive information is protected. Ensure the terms provide adequate data protection and meet your security requirements.",
            RiskCategory::GoverningLaw => "This clause determines which jurisdiction's laws apply and where disputes will be resolved. This may impact legal costs and procedures if disputes arise.",
            RiskCategory::Assignment => "This clause addresses assignment or transfer of rights. Review whether assignments are permitted, require consent, and what restrictions apply.",
            RiskCategory::Notice => "This clause sets notice periods and methods. Short notice periods can make it difficult to respond or exercise your rights in time.",
            RiskCategory::AutomaticRenewal => "This clause includes automatic renewal provisions that could extend the contract without explicit renewal. Review cancellation rights and renewal terms.",
            RiskCategory::Other => return None,
        };
        Some(text)
    }

    fn recommendations(self) -> [&'static str; 3] {
        match self {
            RiskCategory::Termination => [
                "Request mutual termination rights if currently one-sided",
                "Negotiate longer notice periods (60-90 days minimum)",
                "Add clear conditions for termination (e.g., 'just cause' requirements)",
            ],
            RiskCategory::Liability => [
                "Cap liability amounts to reasonable, agreed limits",
                "Ensure liability terms are mutual and fair to both parties",
                "Consider adding liability insurance requirements",
            ],
            RiskCategory::Penalty => [
                "Negotiate reasonable penalty amounts that reflect actual damages",
                "Ensure penalty triggers are clearly defined and reasonable",
                "Request opportunity to cure issues before penalties apply",
            ],
            RiskCategory::Indemnification => [
                "Narrow the indemnity scope to specific situations and losses",
                "Add exceptions for the other party's negligence or willful misconduct",
                "Cap indemnity amounts or require insurance coverage",
            ],
            RiskCategory::Warranty => [
                "Clarify warranty scope, duration, and what is excluded",
                "Ensure warranty disclaimers are reasonable and clearly stated",
                "Request specific warranty language for critical components or services",
            ],
            RiskCategory::Confidentiality => [
                "Strengthen data protection and confidentiality language",
                "Add specific data breach notification requirements and timelines",
                "Ensure compliance with applicable privacy and data protection laws",
            ],
            RiskCategory::GoverningLaw => [
                "Negotiate jurisdiction closer to your location if currently unfavorable",
                "Consider arbitration as an alternative dispute resolution method",
                "Ensure you understand the legal and cost implications of the chosen jurisdiction",
            ],
            RiskCategory::Assignment => [
                "Request right to assign with reasonable notice to the other party",
                "Negotiate assignment restrictions to be reasonable and specific",
                "Add exceptions for assignment to affiliates or in case of merger/acquisition",
            ],
            RiskCategory::Notice => [
                "Request longer notice periods (30-60 days minimum)",
                "Ensure multiple notice methods are accepted (email, registered mail, etc.)",
                "Clarify when notice is considered received and effective",
            ],
            RiskCategory::AutomaticRenewal => [
                "Request opt-in renewal rather than automatic opt-out renewal",
                "Negotiate shorter renewal periods with clear cancellation windows",
                "Add explicit cancellation rights before renewal dates",
            ],
            RiskCategory::Other => [
                "Review the specific language and terms of this clause carefully",
                "Request clarification of any ambiguous or unclear terms",
                "Negotiate modifications to better align with your interests and risk tolerance",
            ],
        }
    }
}

/// 根据标题生成替代解释
///
/// 没有命中任何类别时，解释中会引用原文片段的前 100 个字符。
/// 引用的内容本身带有套话时改用不含原文的固定句子。
pub fn fallback_explanation(title: &str, snippet: &str) -> String {
    if let Some(text) = RiskCategory::from_title(title).explanation() {
        return text.to_string();
    }

    let preview: String = snippet.chars().take(SNIPPET_PREVIEW_CHARS).collect();
    let detail = if preview.is_empty() {
        "Review the specific language to understand its implications.".to_string()
    } else {
        format!("The text mentions: \"{}...\"", preview)
    };
    let explanation = format!(
        "This clause ({}) contains terms that may require careful review. {}",
        title, detail
    );

    if contains_any(&explanation, GENERIC_EXPLANATIONS) {
        return "This clause contains terms that may require careful review. Read the surrounding language closely to understand the obligations and rights it creates.".to_string();
    }
    explanation
}

/// 根据标题生成三条替代建议
pub fn fallback_recommendations(title: &str) -> Vec<String> {
    RiskCategory::from_title(title)
        .recommendations()
        .iter()
        .map(|r| r.to_string())
        .collect()
}
