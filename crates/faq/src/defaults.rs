//! Built-in FAQ entries used to seed an empty store

use contact_center_core::FaqItem;

const DEFAULT_PRIORITY: i32 = 1;

const ENTRIES: &[(&str, &str, &str, &[&str])] = &[
    (
        "일반",
        "영업시간이 어떻게 되나요?",
        "평일 오전 9시부터 오후 6시까지 운영합니다. 주말 및 공휴일은 휴무입니다.",
        &["영업시간", "운영시간", "몇시", "언제", "시간"],
    ),
    (
        "일반",
        "고객센터 전화번호는 무엇인가요?",
        "고객센터 전화번호는 1588-0000입니다. 평일 오전 9시부터 오후 6시까지 상담 가능합니다.",
        &["전화번호", "연락처", "고객센터", "상담"],
    ),
    (
        "주문/배송",
        "주문 취소는 어떻게 하나요?",
        "주문 취소는 배송 준비 전까지 가능합니다. 마이페이지에서 직접 취소하거나 고객센터로 연락주세요.",
        &["주문취소", "취소", "주문", "배송취소"],
    ),
    (
        "주문/배송",
        "배송기간은 얼마나 걸리나요?",
        "일반 배송은 주문 후 2-3일, 당일배송은 오후 2시 이전 주문 시 당일 배송됩니다.",
        &["배송기간", "배송일", "언제", "며칠", "당일배송"],
    ),
    (
        "결제",
        "어떤 결제 방법을 지원하나요?",
        "신용카드, 체크카드, 계좌이체, 무통장입금, 카카오페이, 네이버페이를 지원합니다.",
        &["결제방법", "결제", "카드", "계좌이체", "카카오페이", "네이버페이"],
    ),
    (
        "결제",
        "결제 영수증은 어디서 확인하나요?",
        "마이페이지 > 주문내역에서 영수증을 확인하고 출력할 수 있습니다.",
        &["영수증", "결제확인", "주문내역", "마이페이지"],
    ),
    (
        "회원",
        "회원가입은 필수인가요?",
        "비회원으로도 주문 가능하지만, 회원가입 시 다양한 혜택과 편리한 서비스를 이용할 수 있습니다.",
        &["회원가입", "비회원", "필수", "가입"],
    ),
    (
        "회원",
        "비밀번호를 잊어버렸어요.",
        "로그인 페이지에서 \"비밀번호 찾기\"를 클릭하여 이메일로 재설정 링크를 받으실 수 있습니다.",
        &["비밀번호", "비밀번호찾기", "잊어버림", "재설정"],
    ),
    (
        "반품/교환",
        "반품은 언제까지 가능한가요?",
        "상품 수령 후 7일 이내에 반품 신청이 가능합니다. 상품의 상태가 양호해야 합니다.",
        &["반품", "반품기간", "언제까지", "7일", "교환"],
    ),
    (
        "반품/교환",
        "교환 비용은 누가 부담하나요?",
        "제품 불량의 경우 무료 교환, 단순 변심의 경우 배송비를 고객이 부담합니다.",
        &["교환비용", "배송비", "교환", "불량", "변심"],
    ),
];

/// The ten default FAQ entries with freshly minted ids
pub fn default_faqs() -> Vec<FaqItem> {
    ENTRIES
        .iter()
        .map(|(category, question, answer, keywords)| {
            FaqItem::new(
                *category,
                *question,
                *answer,
                keywords.iter().copied(),
                DEFAULT_PRIORITY,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_defaults_are_complete() {
        let faqs = default_faqs();
        assert_eq!(faqs.len(), 10);
        let ids: HashSet<_> = faqs.iter().map(|f| f.faq_id.clone()).collect();
        assert_eq!(ids.len(), 10);
        assert!(faqs.iter().all(|f| f.is_active && f.faq_id.starts_with("faq_")));
    }
}
