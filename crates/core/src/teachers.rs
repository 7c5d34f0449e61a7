use baodao_common::{Language, Teacher};

pub const TEACHER_COUNT: usize = 3;
pub const BASE_HOURLY_RATE: u32 = 500;
pub const HOURLY_RATE_INCREMENT: u32 = 100;
pub const BASE_EXPERIENCE_YEARS: u32 = 5;

struct TeacherTemplate {
    id: &'static str,
    name: &'static str,
    introduction: &'static str,
    teaching_style: &'static str,
    /// Canonical labels, translated for display via `taught_language_name`.
    languages: &'static [&'static str],
}

/// Produce the mock teacher directory for a language: deterministic order,
/// derived pricing and experience, display names localized.
pub fn list_teachers(count: usize, language: Language) -> Vec<Teacher> {
    templates(language)
        .iter()
        .take(count)
        .enumerate()
        .map(|(index, t)| Teacher {
            id: t.id.to_string(),
            name: t.name.to_string(),
            email: format!("{}@example.com", t.name.to_lowercase().replace(' ', ".")),
            profile_image_url: format!(
                "https://api.dicebear.com/7.x/avataaars/svg?seed={}",
                index
            ),
            introduction: t.introduction.to_string(),
            teaching_style: t.teaching_style.to_string(),
            languages: t
                .languages
                .iter()
                .map(|label| taught_language_name(label, language))
                .collect(),
            years_of_experience: BASE_EXPERIENCE_YEARS + index as u32,
            hourly_rate: BASE_HOURLY_RATE + index as u32 * HOURLY_RATE_INCREMENT,
        })
        .collect()
}

/// Closed display-name table for the languages teachers teach. Labels
/// outside the table pass through unchanged.
fn taught_language_name(label: &str, language: Language) -> String {
    let translated = match language {
        Language::En => match label {
            "English" => "English",
            "Chinese" => "Chinese",
            "Japanese" => "Japanese",
            "French" => "French",
            "Spanish" => "Spanish",
            _ => label,
        },
        Language::Zh => match label {
            "English" => "英語",
            "Chinese" => "中文",
            "Japanese" => "日語",
            "French" => "法語",
            "Spanish" => "西班牙語",
            _ => label,
        },
        Language::Ja => match label {
            "English" => "英語",
            "Chinese" => "中国語",
            "Japanese" => "日本語",
            "French" => "フランス語",
            "Spanish" => "スペイン語",
            _ => label,
        },
        Language::Ko => match label {
            "English" => "영어",
            "Chinese" => "중국어",
            "Japanese" => "일본어",
            "French" => "프랑스어",
            "Spanish" => "스페인어",
            _ => label,
        },
        Language::Es => match label {
            "English" => "Inglés",
            "Chinese" => "Chino",
            "Japanese" => "Japonés",
            "French" => "Francés",
            "Spanish" => "Español",
            _ => label,
        },
        Language::Fr => match label {
            "English" => "Anglais",
            "Chinese" => "Chinois",
            "Japanese" => "Japonais",
            "French" => "Français",
            "Spanish" => "Espagnol",
            _ => label,
        },
    };
    translated.to_string()
}

fn templates(language: Language) -> &'static [TeacherTemplate; 3] {
    match language {
        Language::En => &[
            TeacherTemplate {
                id: "teacher-1",
                name: "Sarah Johnson",
                introduction: "Experienced language teacher focusing on conversation skills. I believe in creating a comfortable learning environment where students can practice speaking naturally.",
                teaching_style: "Interactive & Conversation-focused",
                languages: &["English", "Spanish"],
            },
            TeacherTemplate {
                id: "teacher-2",
                name: "Michael Chen",
                introduction: "Specialized in business English with 8 years of corporate training experience. I help professionals improve their communication skills in business contexts.",
                teaching_style: "Business-oriented & Practical",
                languages: &["English", "Chinese"],
            },
            TeacherTemplate {
                id: "teacher-3",
                name: "Emily Parker",
                introduction: "Interactive teaching style perfect for beginners. I make learning fun and engaging through games, role-play, and real-life scenarios.",
                teaching_style: "Fun & Interactive",
                languages: &["English", "French"],
            },
        ],
        Language::Zh => &[
            TeacherTemplate {
                id: "teacher-1",
                name: "Sarah Johnson",
                introduction: "經驗豐富的語言教師，專注於會話技巧。我相信創造一個舒適的學習環境，讓學生能夠自然地練習口說。",
                teaching_style: "互動式與會話導向",
                languages: &["English", "Spanish"],
            },
            TeacherTemplate {
                id: "teacher-2",
                name: "Michael Chen",
                introduction: "專精商業英語，擁有8年企業培訓經驗。我協助專業人士提升其商務溝通能力。",
                teaching_style: "商務導向與實用性教學",
                languages: &["English", "Chinese"],
            },
            TeacherTemplate {
                id: "teacher-3",
                name: "Emily Parker",
                introduction: "互動式教學特別適合初學者。我透過遊戲、角色扮演和真實場景讓學習變得有趣且引人入勝。",
                teaching_style: "有趣且互動的教學方式",
                languages: &["English", "French"],
            },
        ],
        Language::Ja => &[
            TeacherTemplate {
                id: "teacher-1",
                name: "Sarah Johnson",
                introduction: "会話力向上に重点を置いた経験豊富な語学講師です。生徒が自然に話せる快適な学習環境づくりを心がけています。",
                teaching_style: "インタラクティブ＆会話重視",
                languages: &["English", "Spanish"],
            },
            TeacherTemplate {
                id: "teacher-2",
                name: "Michael Chen",
                introduction: "ビジネス英語を専門とし、企業研修で8年の経験があります。ビジネスシーンでのコミュニケーション力向上をサポートします。",
                teaching_style: "ビジネス指向＆実践的",
                languages: &["English", "Chinese"],
            },
            TeacherTemplate {
                id: "teacher-3",
                name: "Emily Parker",
                introduction: "初心者に最適なインタラクティブな指導スタイル。ゲームやロールプレイ、実践的なシナリオを通じて、楽しく魅力的な学習を提供します。",
                teaching_style: "楽しく双方向的な指導法",
                languages: &["English", "French"],
            },
        ],
        Language::Ko => &[
            TeacherTemplate {
                id: "teacher-1",
                name: "Sarah Johnson",
                introduction: "회화 실력 향상에 중점을 둔 경험 많은 어학 강사입니다. 학생들이 자연스럽게 말할 수 있는 편안한 학습 환경을 만드는 것을 지향합니다.",
                teaching_style: "상호작용 및 회화 중심",
                languages: &["English", "Spanish"],
            },
            TeacherTemplate {
                id: "teacher-2",
                name: "Michael Chen",
                introduction: "비즈니스 영어를 전문으로 하며 8년간의 기업 교육 경험이 있습니다. 비즈니스 상황에서의 의사소통 능력 향상을 도와드립니다.",
                teaching_style: "비즈니스 지향 및 실용적 교육",
                languages: &["English", "Chinese"],
            },
            TeacherTemplate {
                id: "teacher-3",
                name: "Emily Parker",
                introduction: "초보자에게 완벽한 상호작용 교육 방식. 게임, 역할극, 실제 상황을 통해 재미있고 흥미로운 학습을 제공합니다.",
                teaching_style: "즐겁고 상호작용적인 교육",
                languages: &["English", "French"],
            },
        ],
        Language::Es => &[
            TeacherTemplate {
                id: "teacher-1",
                name: "Sarah Johnson",
                introduction: "Profesora de idiomas experimentada centrada en habilidades de conversación. Creo en crear un ambiente de aprendizaje cómodo donde los estudiantes puedan practicar hablar naturalmente.",
                teaching_style: "Interactivo y enfocado en la conversación",
                languages: &["English", "Spanish"],
            },
            TeacherTemplate {
                id: "teacher-2",
                name: "Michael Chen",
                introduction: "Especializado en inglés de negocios con 8 años de experiencia en capacitación corporativa. Ayudo a profesionales a mejorar sus habilidades de comunicación en contextos empresariales.",
                teaching_style: "Orientado a negocios y práctico",
                languages: &["English", "Chinese"],
            },
            TeacherTemplate {
                id: "teacher-3",
                name: "Emily Parker",
                introduction: "Estilo de enseñanza interactivo perfecto para principiantes. Hago que el aprendizaje sea divertido y atractivo a través de juegos, juegos de roles y escenarios de la vida real.",
                teaching_style: "Divertido e interactivo",
                languages: &["English", "French"],
            },
        ],
        Language::Fr => &[
            TeacherTemplate {
                id: "teacher-1",
                name: "Sarah Johnson",
                introduction: "Professeure de langues expérimentée axée sur les compétences conversationnelles. Je crois en la création d'un environnement d'apprentissage confortable où les étudiants peuvent pratiquer la parole naturellement.",
                teaching_style: "Interactif et axé sur la conversation",
                languages: &["English", "Spanish"],
            },
            TeacherTemplate {
                id: "teacher-2",
                name: "Michael Chen",
                introduction: "Spécialisé dans l'anglais des affaires avec 8 ans d'expérience en formation d'entreprise. J'aide les professionnels à améliorer leurs compétences en communication dans des contextes commerciaux.",
                teaching_style: "Orienté business et pratique",
                languages: &["English", "Chinese"],
            },
            TeacherTemplate {
                id: "teacher-3",
                name: "Emily Parker",
                introduction: "Style d'enseignement interactif parfait pour les débutants. Je rends l'apprentissage amusant et engageant grâce à des jeux, des jeux de rôle et des scénarios de la vie réelle.",
                teaching_style: "Amusant et interactif",
                languages: &["English", "French"],
            },
        ],
    }
}
