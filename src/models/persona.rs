use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Titles still eligible for the one-time smart-title replacement.
pub const PLACEHOLDER_TITLES: [&str; 3] = [
    "Cuộc trò chuyện mới",
    "Tư vấn tuyển sinh",
    "Hỗ trợ người học",
];

/// Title given to conversations created without an explicit one.
pub const DEFAULT_CONVERSATION_TITLE: &str = "Cuộc trò chuyện mới";

/// Shown as the assistant's reply when the generation pipeline fails.
pub const APOLOGY_REPLY: &str =
    "Xin lỗi, Cố vấn đang gặp một chút sự cố kỹ thuật. Bạn vui lòng thử lại sau nhé.";

const BASE_SYSTEM_PROMPT: &str = r#"# SYSTEM PROMPT - TRỢ LÝ ẢO TƯ VẤN HỌC TẬP & TUYỂN SINH (PHIÊN BẢN HUE)

Bạn là "Cố vấn HUE", một Trợ lý ảo Thông minh và thân thiện của Trường Đại học Kinh tế, Đại học Huế. Sứ mệnh của bạn là cung cấp thông tin chính xác, đồng hành cùng các bạn học sinh, sinh viên.

Giọng văn: Chuyên nghiệp, thân thiện, gần gũi, mang đậm bản sắc Huế. Xưng hô là "Cố vấn" và gọi người dùng là "bạn".

QUY TẮC VÀNG: Nếu không biết câu trả lời, bạn PHẢI trả lời: "Cảm ơn câu hỏi của bạn. Về vấn đề này, Cố vấn chưa có thông tin chính thức. Bạn vui lòng liên hệ phòng Đào tạo để được hỗ trợ chính xác nhất nhé." TUYỆT ĐỐI KHÔNG BỊA ĐẶT DỮ LIỆU."#;

pub fn is_placeholder_title(title: &str) -> bool {
    PLACEHOLDER_TITLES.contains(&title.trim())
}

/// Persona tag selecting the greeting and system prompt variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssistantType {
    /// "Tư vấn Tuyển sinh" - admissions counselling.
    #[default]
    TuyenSinh,
    /// "Hỗ trợ Người học" - academic support.
    HocTap,
}

impl AssistantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantType::TuyenSinh => "tuyen_sinh",
            AssistantType::HocTap => "hoc_tap",
        }
    }

    /// Placeholder title a fresh conversation of this persona starts with.
    pub fn default_title(&self) -> &'static str {
        match self {
            AssistantType::TuyenSinh => "Tư vấn tuyển sinh",
            AssistantType::HocTap => "Hỗ trợ người học",
        }
    }

    /// Fixed greeting appended as the first assistant message.
    pub fn greeting(&self) -> &'static str {
        match self {
            AssistantType::TuyenSinh => {
                "Xin chào! Cố vấn tuyển sinh HCE đây. Bạn muốn tìm hiểu về điểm chuẩn, \
                 phương thức xét tuyển, ngành học hay học phí nào nhỉ?"
            }
            AssistantType::HocTap => {
                "Xin chào! Cố vấn học tập HCE đây. Bạn cần hỗ trợ về đăng ký học phần, \
                 lịch học, quy chế hay hoạt động nào của trường nhỉ?"
            }
        }
    }

    /// Quick-start questions offered on the assistant picker.
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            AssistantType::TuyenSinh => &[
                "Điểm chuẩn năm ngoái?",
                "Học phí ngành Quản trị Kinh doanh?",
                "Các phương thức xét tuyển?",
            ],
            AssistantType::HocTap => &[
                "Cách đăng ký học phần?",
                "Lịch học tuần này?",
                "Các câu lạc bộ của trường?",
            ],
        }
    }

    pub fn system_prompt(&self) -> String {
        let focus = match self {
            AssistantType::TuyenSinh => {
                "Trọng tâm hiện tại: TƯ VẤN TUYỂN SINH - điểm chuẩn, phương thức xét tuyển, \
                 ngành đào tạo, học phí và học bổng."
            }
            AssistantType::HocTap => {
                "Trọng tâm hiện tại: HỖ TRỢ NGƯỜI HỌC - đăng ký học phần, lịch học, quy chế, \
                 câu lạc bộ và học liệu."
            }
        };
        format!("{BASE_SYSTEM_PROMPT}\n\n{focus}")
    }
}

impl fmt::Display for AssistantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid assistant type: {0}")]
pub struct InvalidAssistantType(pub String);

impl FromStr for AssistantType {
    type Err = InvalidAssistantType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tuyen_sinh" => Ok(AssistantType::TuyenSinh),
            "hoc_tap" => Ok(AssistantType::HocTap),
            other => Err(InvalidAssistantType(other.to_string())),
        }
    }
}
