//! 高亮映射 - 业务能力层
//!
//! 把一页文字上的风险区间整理成互不重叠的高亮区间，
//! 再切分成"普通/高亮"片段交给展示层。
//!
//! 所有偏移量都是字符偏移（Unicode 标量值），切片时再换算成字节偏移。

use std::collections::BTreeSet;

use crate::models::{RiskRecord, Severity};

/// 一页文字上的高亮区间，`start..end` 为字符偏移，左闭右开
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
    pub severity: Severity,
}

/// 渲染片段：普通文字或带等级的高亮文字
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub highlight: Option<Severity>,
}

impl<'a> Segment<'a> {
    fn plain(text: &'a str) -> Self {
        Self {
            text,
            highlight: None,
        }
    }
}

/// 高亮映射器
pub struct HighlightMapper;

impl HighlightMapper {
    /// 计算一页上的高亮区间
    ///
    /// # 参数
    /// - `page_text`: 页面文字
    /// - `risks`: 该页上的风险记录
    ///
    /// # 返回
    /// 按起点升序、互不重叠的区间。越界或空的区间被丢弃；
    /// 与前一个区间重叠的部分被裁掉，只保留超出的尾部。
    pub fn map_highlights<'r, I>(page_text: &str, risks: I) -> Vec<HighlightSpan>
    where
        I: IntoIterator<Item = &'r RiskRecord>,
    {
        let spans: Vec<HighlightSpan> = risks
            .into_iter()
            .map(|risk| HighlightSpan {
                start: risk.highlight_start,
                end: risk.highlight_end,
                severity: risk.severity,
            })
            .collect();
        clip_spans(page_text.chars().count(), &spans)
    }

    /// 把页面文字切分成片段
    ///
    /// 片段按顺序拼接后与 `page_text` 完全相同。空文字返回一个空的普通片段。
    pub fn render_segments<'a>(page_text: &'a str, spans: &[HighlightSpan]) -> Vec<Segment<'a>> {
        // 第 i 个字符的字节起点，末尾追加文字总长度
        let boundaries: Vec<usize> = page_text
            .char_indices()
            .map(|(idx, _)| idx)
            .chain(std::iter::once(page_text.len()))
            .collect();
        let char_len = boundaries.len() - 1;
        let slice = |from: usize, to: usize| &page_text[boundaries[from]..boundaries[to]];

        let mut segments = Vec::new();
        let mut cursor = 0;
        for span in clip_spans(char_len, spans) {
            if span.start > cursor {
                segments.push(Segment::plain(slice(cursor, span.start)));
            }
            segments.push(Segment {
                text: slice(span.start, span.end),
                highlight: Some(span.severity),
            });
            cursor = span.end;
        }
        if cursor < char_len || segments.is_empty() {
            segments.push(Segment::plain(slice(cursor, char_len)));
        }
        segments
    }

    /// 一步完成：风险记录 -> 渲染片段
    pub fn highlight_page<'a, 'r, I>(page_text: &'a str, risks: I) -> Vec<Segment<'a>>
    where
        I: IntoIterator<Item = &'r RiskRecord>,
    {
        let spans = Self::map_highlights(page_text, risks);
        Self::render_segments(page_text, &spans)
    }
}

/// 过滤无效区间，按起点排序，并把重叠部分裁掉
fn clip_spans(char_len: usize, spans: &[HighlightSpan]) -> Vec<HighlightSpan> {
    let mut valid: Vec<HighlightSpan> = spans
        .iter()
        .copied()
        .filter(|s| s.start < s.end && s.end <= char_len)
        .collect();
    // 稳定排序：起点相同的区间保持输入顺序
    valid.sort_by_key(|s| s.start);

    let mut clipped = Vec::with_capacity(valid.len());
    let mut cursor = 0;
    for span in valid {
        let start = span.start.max(cursor);
        if span.end > start {
            clipped.push(HighlightSpan { start, ..span });
        }
        cursor = cursor.max(span.end);
    }
    clipped
}

/// 按页码组织风险记录
pub struct PageIndex<'a> {
    risks: &'a [RiskRecord],
}

impl<'a> PageIndex<'a> {
    pub fn new(risks: &'a [RiskRecord]) -> Self {
        Self { risks }
    }

    /// 有风险的页码，升序去重；没有风险时为 `[1]`
    pub fn page_numbers(&self) -> Vec<u32> {
        let pages: BTreeSet<u32> = self.risks.iter().map(|r| r.page_number).collect();
        if pages.is_empty() {
            return vec![1];
        }
        pages.into_iter().collect()
    }

    pub fn max_page(&self) -> u32 {
        self.risks.iter().map(|r| r.page_number).max().unwrap_or(1)
    }

    /// 该页上第一条带文字的风险记录的页面文字；没有时为空字符串
    pub fn page_text(&self, page: u32) -> &'a str {
        self.risks
            .iter()
            .find(|r| r.page_number == page && !r.page_text.is_empty())
            .map(|r| r.page_text.as_str())
            .unwrap_or("")
    }

    pub fn risks_on_page(&self, page: u32) -> Vec<&'a RiskRecord> {
        self.risks.iter().filter(|r| r.page_number == page).collect()
    }

    /// 渲染某一页的片段
    pub fn render_page(&self, page: u32) -> Vec<Segment<'a>> {
        HighlightMapper::highlight_page(self.page_text(page), self.risks_on_page(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn risk(id: &str, page: u32, text: &str, start: usize, end: usize, severity: Severity) -> RiskRecord {
        RiskRecord {
            id: id.to_string(),
            severity,
            severity_score: 50.0,
            title: id.to_string(),
            explanation: String::new(),
            recommendations: Vec::new(),
            page_number: page,
            page_text: text.to_string(),
            highlight_text: String::new(),
            highlight_start: start,
            highlight_end: end,
        }
    }

    fn joined(segments: &[Segment<'_>]) -> String {
        segments.iter().map(|s| s.text).collect()
    }

    #[test]
    fn test_basic_segments() {
        let text = "The tenant shall pay rent monthly.";
        let risks = vec![risk("r1", 1, text, 4, 10, Severity::High)];
        let segments = HighlightMapper::highlight_page(text, &risks);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment { text: "The ", highlight: None });
        assert_eq!(segments[1], Segment { text: "tenant", highlight: Some(Severity::High) });
        assert_eq!(segments[2].text, " shall pay rent monthly.");
    }

    #[test]
    fn test_invalid_ranges_are_dropped() {
        let text = "short";
        let risks = vec![
            risk("empty", 1, text, 2, 2, Severity::High),
            risk("reversed", 1, text, 4, 1, Severity::High),
            risk("past_end", 1, text, 3, 9, Severity::High),
        ];
        assert!(HighlightMapper::map_highlights(text, &risks).is_empty());
        assert_eq!(
            HighlightMapper::highlight_page(text, &risks),
            vec![Segment { text: "short", highlight: None }]
        );
    }

    #[test]
    fn test_overlap_keeps_only_trailing_excess() {
        let text = "0123456789";
        let risks = vec![
            risk("b", 1, text, 4, 8, Severity::Low),
            risk("a", 1, text, 2, 6, Severity::High),
            risk("inside", 1, text, 3, 5, Severity::Medium),
        ];
        let spans = HighlightMapper::map_highlights(text, &risks);
        assert_eq!(
            spans,
            vec![
                HighlightSpan { start: 2, end: 6, severity: Severity::High },
                HighlightSpan { start: 6, end: 8, severity: Severity::Low },
            ]
        );

        let segments = HighlightMapper::render_segments(text, &spans);
        assert_eq!(joined(&segments), text);
        assert_eq!(segments[2], Segment { text: "67", highlight: Some(Severity::Low) });
    }

    #[test]
    fn test_offsets_are_characters() {
        let text = "§1 Kündigung: fristlos";
        let risks = vec![risk("r1", 1, text, 3, 12, Severity::Medium)];
        let segments = HighlightMapper::highlight_page(text, &risks);
        assert_eq!(segments[1].text, "Kündigung");
        assert_eq!(joined(&segments), text);
    }

    #[test]
    fn test_empty_page_text() {
        let segments = HighlightMapper::render_segments("", &[]);
        assert_eq!(segments, vec![Segment { text: "", highlight: None }]);
    }

    #[test]
    fn test_page_index() {
        let risks = vec![
            risk("a", 3, "", 0, 0, Severity::Low),
            risk("b", 3, "page three", 0, 4, Severity::High),
            risk("c", 1, "page one", 0, 4, Severity::Low),
        ];
        let index = PageIndex::new(&risks);

        assert_eq!(index.page_numbers(), vec![1, 3]);
        assert_eq!(index.max_page(), 3);
        assert_eq!(index.page_text(3), "page three");
        assert_eq!(index.page_text(2), "");
        assert_eq!(index.risks_on_page(3).len(), 2);
        assert_eq!(index.render_page(3)[0].text, "page");

        assert_eq!(PageIndex::new(&[]).page_numbers(), vec![1]);
    }

    fn severity() -> impl Strategy<Value = Severity> {
        prop_oneof![Just(Severity::Low), Just(Severity::Medium), Just(Severity::High)]
    }

    proptest! {
        #[test]
        fn prop_segments_reproduce_page_text(
            text in "\\PC{0,40}",
            raw in prop::collection::vec((0usize..50, 0usize..50, severity()), 0..8),
        ) {
            let spans: Vec<HighlightSpan> = raw
                .into_iter()
                .map(|(start, end, severity)| HighlightSpan { start, end, severity })
                .collect();
            let char_len = text.chars().count();

            let clipped = clip_spans(char_len, &spans);
            for pair in clipped.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
            for span in &clipped {
                prop_assert!(span.start < span.end && span.end <= char_len);
            }

            let segments = HighlightMapper::render_segments(&text, &spans);
            prop_assert_eq!(joined(&segments), text.clone());
            for segment in segments.iter().filter(|s| s.highlight.is_some()) {
                prop_assert!(!segment.text.is_empty());
            }
        }
    }
}
