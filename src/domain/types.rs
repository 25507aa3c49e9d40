// ==========================================
// 学生作业分派引擎 - 领域类型定义
// ==========================================
// 依据: 作业规则手册 - 角色/性别/节目类型
// 红线: 角色与性别共同决定可分派的节目类型,运行期不可配置
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 性别 (Gender)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,   // 弟兄
    Female, // 姊妹
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Gender {
    /// 从字符串解析性别（未知值返回 None，由调用方决定如何处理）
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "MALE" | "M" => Some(Gender::Male),
            "FEMALE" | "F" => Some(Gender::Female),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

// ==========================================
// 学生身份 (Student Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentRole {
    UnbaptizedPublisher, // 未受浸传道员
    BaptizedPublisher,   // 受浸传道员
    RegularPioneer,      // 正规先驱
    MinisterialServant,  // 助理仆人
    Elder,               // 长老
    NewStudent,          // 新学生
}

impl fmt::Display for StudentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl StudentRole {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "UNBAPTIZED_PUBLISHER" => Some(StudentRole::UnbaptizedPublisher),
            "BAPTIZED_PUBLISHER" => Some(StudentRole::BaptizedPublisher),
            "REGULAR_PIONEER" => Some(StudentRole::RegularPioneer),
            "MINISTERIAL_SERVANT" => Some(StudentRole::MinisterialServant),
            "ELDER" => Some(StudentRole::Elder),
            "NEW_STUDENT" => Some(StudentRole::NewStudent),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            StudentRole::UnbaptizedPublisher => "UNBAPTIZED_PUBLISHER",
            StudentRole::BaptizedPublisher => "BAPTIZED_PUBLISHER",
            StudentRole::RegularPioneer => "REGULAR_PIONEER",
            StudentRole::MinisterialServant => "MINISTERIAL_SERVANT",
            StudentRole::Elder => "ELDER",
            StudentRole::NewStudent => "NEW_STUDENT",
        }
    }

    /// 是否具备讲演资格（长老/助理仆人/正规先驱/受浸传道员）
    pub fn is_discourse_qualified(&self) -> bool {
        matches!(
            self,
            StudentRole::Elder
                | StudentRole::MinisterialServant
                | StudentRole::RegularPioneer
                | StudentRole::BaptizedPublisher
        )
    }
}

// ==========================================
// 节目类型 (Part Type)
// ==========================================
// 红线: 新增类型必须在 eligibility 的 match 中显式处理
// Unknown 保留原始字符串,判定时一律不合格
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartType {
    // ===== 学生讲演 =====
    BibleReading, // 经文朗读
    Talk,         // 学生演讲

    // ===== 需讲演资格 =====
    Treasures,              // 上帝话语的宝藏
    SpiritualGems,          // 挖掘属灵宝石
    CongregationBibleStudy, // 会众研经班主持
    OpeningPrayer,          // 开始祷告
    ClosingPrayer,          // 结束祷告
    OpeningComments,        // 开场白
    ClosingComments,        // 结束语
    ChristianLifeTalk,      // 基督徒生活演讲

    // ===== 传道示范 =====
    Demonstration,        // 示范
    StartingConversation, // 开始交谈
    FollowingUp,          // 续访
    MakingDisciples,      // 培养门徒
    MinistryPart,         // 其他传道节目

    Unknown(String),
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartType::Unknown(raw) => write!(f, "UNKNOWN({})", raw),
            other => write!(f, "{}", other.to_db_str()),
        }
    }
}

impl PartType {
    /// 从字符串解析节目类型（无法识别时返回 Unknown，不报错）
    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "BIBLE_READING" => PartType::BibleReading,
            "TALK" => PartType::Talk,
            "TREASURES" => PartType::Treasures,
            "SPIRITUAL_GEMS" | "GEMS" => PartType::SpiritualGems,
            "CONGREGATION_BIBLE_STUDY" => PartType::CongregationBibleStudy,
            "OPENING_PRAYER" => PartType::OpeningPrayer,
            "CLOSING_PRAYER" => PartType::ClosingPrayer,
            "OPENING_COMMENTS" => PartType::OpeningComments,
            "CLOSING_COMMENTS" => PartType::ClosingComments,
            "CHRISTIAN_LIFE_TALK" => PartType::ChristianLifeTalk,
            "DEMONSTRATION" => PartType::Demonstration,
            "STARTING_CONVERSATION" => PartType::StartingConversation,
            "FOLLOWING_UP" => PartType::FollowingUp,
            "MAKING_DISCIPLES" => PartType::MakingDisciples,
            "MINISTRY_PART" => PartType::MinistryPart,
            _ => PartType::Unknown(s.trim().to_string()),
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &str {
        match self {
            PartType::BibleReading => "BIBLE_READING",
            PartType::Talk => "TALK",
            PartType::Treasures => "TREASURES",
            PartType::SpiritualGems => "SPIRITUAL_GEMS",
            PartType::CongregationBibleStudy => "CONGREGATION_BIBLE_STUDY",
            PartType::OpeningPrayer => "OPENING_PRAYER",
            PartType::ClosingPrayer => "CLOSING_PRAYER",
            PartType::OpeningComments => "OPENING_COMMENTS",
            PartType::ClosingComments => "CLOSING_COMMENTS",
            PartType::ChristianLifeTalk => "CHRISTIAN_LIFE_TALK",
            PartType::Demonstration => "DEMONSTRATION",
            PartType::StartingConversation => "STARTING_CONVERSATION",
            PartType::FollowingUp => "FOLLOWING_UP",
            PartType::MakingDisciples => "MAKING_DISCIPLES",
            PartType::MinistryPart => "MINISTRY_PART",
            PartType::Unknown(raw) => raw.as_str(),
        }
    }

    /// 是否需要助手（由类型推导,不单独存储）
    pub fn requires_helper(&self) -> bool {
        match self {
            PartType::Demonstration
            | PartType::StartingConversation
            | PartType::FollowingUp
            | PartType::MakingDisciples => true,
            PartType::BibleReading
            | PartType::Talk
            | PartType::Treasures
            | PartType::SpiritualGems
            | PartType::CongregationBibleStudy
            | PartType::OpeningPrayer
            | PartType::ClosingPrayer
            | PartType::OpeningComments
            | PartType::ClosingComments
            | PartType::ChristianLifeTalk
            | PartType::MinistryPart
            | PartType::Unknown(_) => false,
        }
    }
}

// ==========================================
// 家庭关系类型 (Relationship Kind)
// ==========================================
// 仅用于放行异性助手配对
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    Parent,   // 父母
    Child,    // 子女
    Spouse,   // 配偶
    Sibling,  // 兄弟姊妹
    Guardian, // 监护人
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl RelationshipKind {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PARENT" => Some(RelationshipKind::Parent),
            "CHILD" => Some(RelationshipKind::Child),
            "SPOUSE" => Some(RelationshipKind::Spouse),
            "SIBLING" => Some(RelationshipKind::Sibling),
            "GUARDIAN" => Some(RelationshipKind::Guardian),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            RelationshipKind::Parent => "PARENT",
            RelationshipKind::Child => "CHILD",
            RelationshipKind::Spouse => "SPOUSE",
            RelationshipKind::Sibling => "SIBLING",
            RelationshipKind::Guardian => "GUARDIAN",
        }
    }
}

// ==========================================
// 分派集版本状态 (Assignment Set Status)
// ==========================================
// 每个节目单同一时刻最多一个 ACTIVE 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentSetStatus {
    Active,   // 当前生效
    Archived, // 已归档
}

impl fmt::Display for AssignmentSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl AssignmentSetStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ACTIVE" => AssignmentSetStatus::Active,
            _ => AssignmentSetStatus::Archived,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AssignmentSetStatus::Active => "ACTIVE",
            AssignmentSetStatus::Archived => "ARCHIVED",
        }
    }
}
