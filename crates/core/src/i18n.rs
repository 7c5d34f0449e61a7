use baodao_common::{render_template, Language, LessonType};
use std::collections::HashMap;

/// Keys into the translation table. The orchestrator only ever branches on
/// these keys and on step state, never on the translated strings themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    AskLessonType,
    SelectTime,
    SelectTeacher,
    BookingConfirmed,
    SelectPaymentMethod,
    TeacherSelected,
    ServiceUnavailable,
    EmailSubject,
    EmailBody,
}

pub fn phrase(key: MessageKey, language: Language) -> &'static str {
    use Language::*;
    use MessageKey::*;
    match (key, language) {
        (AskLessonType, En) => "Would you like a trial or regular lesson?",
        (AskLessonType, Zh) => "您想要預約試聽課程還是正式課程？",
        (AskLessonType, Ja) => "体験レッスンと通常レッスン、どちらをご希望ですか？",
        (AskLessonType, Ko) => "체험 수업과 정규 수업 중 어떤 것을 원하시나요?",
        (AskLessonType, Es) => "¿Desea una clase de prueba o una clase regular?",
        (AskLessonType, Fr) => "Souhaitez-vous une leçon d'essai ou une leçon régulière ?",

        (SelectTime, En) => "Please select a time.",
        (SelectTime, Zh) => "請選擇時間。",
        (SelectTime, Ja) => "時間を選択してください。",
        (SelectTime, Ko) => "시간을 선택해 주세요.",
        (SelectTime, Es) => "Por favor, seleccione una hora.",
        (SelectTime, Fr) => "Veuillez choisir une heure.",

        (SelectTeacher, En) => "Please select a teacher.",
        (SelectTeacher, Zh) => "請選擇老師。",
        (SelectTeacher, Ja) => "講師を選択してください。",
        (SelectTeacher, Ko) => "선생님을 선택해 주세요.",
        (SelectTeacher, Es) => "Por favor, seleccione un profesor.",
        (SelectTeacher, Fr) => "Veuillez choisir un professeur.",

        (BookingConfirmed, En) => "Your booking is confirmed.",
        (BookingConfirmed, Zh) => "您的預約已確認。",
        (BookingConfirmed, Ja) => "ご予約が確定しました。",
        (BookingConfirmed, Ko) => "예약이 확정되었습니다.",
        (BookingConfirmed, Es) => "Su reserva está confirmada.",
        (BookingConfirmed, Fr) => "Votre réservation est confirmée.",

        (SelectPaymentMethod, En) => "Please select a payment method.",
        (SelectPaymentMethod, Zh) => "請選擇付款方式。",
        (SelectPaymentMethod, Ja) => "お支払い方法を選択してください。",
        (SelectPaymentMethod, Ko) => "결제 방법을 선택해 주세요.",
        (SelectPaymentMethod, Es) => "Por favor, seleccione un método de pago.",
        (SelectPaymentMethod, Fr) => "Veuillez choisir un mode de paiement.",

        (TeacherSelected, En) => "You have selected teacher {name}",
        (TeacherSelected, Zh) => "您已選擇 {name} 老師",
        (TeacherSelected, Ja) => "{name}先生を選択しました",
        (TeacherSelected, Ko) => "{name} 선생님을 선택하셨습니다",
        (TeacherSelected, Es) => "Has seleccionado al profesor {name}",
        (TeacherSelected, Fr) => "Vous avez sélectionné le professeur {name}",

        (ServiceUnavailable, En) => "The FAQ service is temporarily unavailable. Please try again later.",
        (ServiceUnavailable, Zh) => "FAQ 服務暫時無法使用，請稍後再試。",
        (ServiceUnavailable, Ja) => "FAQサービスは一時的に利用できません。後ほどお試しください。",
        (ServiceUnavailable, Ko) => "FAQ 서비스를 일시적으로 이용할 수 없습니다. 나중에 다시 시도해 주세요.",
        (ServiceUnavailable, Es) => "El servicio de preguntas frecuentes no está disponible temporalmente. Inténtelo de nuevo más tarde.",
        (ServiceUnavailable, Fr) => "Le service FAQ est temporairement indisponible. Veuillez réessayer plus tard.",

        (EmailSubject, En) => "Lesson booking confirmation - {lesson}",
        (EmailSubject, Zh) => "課程預約確認 - {lesson}",
        (EmailSubject, Ja) => "レッスン予約確認 - {lesson}",
        (EmailSubject, Ko) => "수업 예약 확인 - {lesson}",
        (EmailSubject, Es) => "Confirmación de reserva de clase - {lesson}",
        (EmailSubject, Fr) => "Confirmation de réservation de leçon - {lesson}",

        (EmailBody, En) => "Dear {student},\n\nYour lesson booking is confirmed!\n\nTeacher: {teacher}\nTime: {time}\nType: {lesson}\n\nClassroom link: {link}\n",
        (EmailBody, Zh) => "親愛的 {student}：\n\n您的課程預約已確認！\n\n老師：{teacher}\n時間：{time}\n類型：{lesson}\n\n教室連結：{link}\n",
        (EmailBody, Ja) => "{student} 様\n\nレッスンのご予約が確定しました。\n\n講師：{teacher}\n時間：{time}\n種類：{lesson}\n\n教室リンク：{link}\n",
        (EmailBody, Ko) => "{student} 님께\n\n수업 예약이 확정되었습니다!\n\n선생님: {teacher}\n시간: {time}\n유형: {lesson}\n\n교실 링크: {link}\n",
        (EmailBody, Es) => "Estimado/a {student}:\n\n¡Su reserva de clase está confirmada!\n\nProfesor: {teacher}\nHora: {time}\nTipo: {lesson}\n\nEnlace del aula: {link}\n",
        (EmailBody, Fr) => "Cher/Chère {student},\n\nVotre réservation de leçon est confirmée !\n\nProfesseur : {teacher}\nHeure : {time}\nType : {lesson}\n\nLien de la salle : {link}\n",
    }
}

pub fn lesson_type_label(lesson_type: LessonType, language: Language) -> &'static str {
    use Language::*;
    match (lesson_type, language) {
        (LessonType::Trial, En) => "Trial Lesson",
        (LessonType::Trial, Zh) => "體驗課",
        (LessonType::Trial, Ja) => "体験レッスン",
        (LessonType::Trial, Ko) => "체험 수업",
        (LessonType::Trial, Es) => "Clase de prueba",
        (LessonType::Trial, Fr) => "Leçon d'essai",
        (LessonType::Regular, En) => "Regular Lesson",
        (LessonType::Regular, Zh) => "正式課程",
        (LessonType::Regular, Ja) => "通常レッスン",
        (LessonType::Regular, Ko) => "정규 수업",
        (LessonType::Regular, Es) => "Clase regular",
        (LessonType::Regular, Fr) => "Leçon régulière",
    }
}

/// Look up a template and substitute `{placeholder}` parameters.
pub fn render(key: MessageKey, language: Language, params: &HashMap<&str, String>) -> String {
    render_template(phrase(key, language), params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_has_all_languages() {
        // The match above is exhaustive by construction; spot-check a few
        // pairings are non-empty and distinct across languages.
        for lang in Language::ALL {
            assert!(!phrase(MessageKey::AskLessonType, lang).is_empty());
            assert!(!phrase(MessageKey::BookingConfirmed, lang).is_empty());
        }
        assert_ne!(
            phrase(MessageKey::SelectTeacher, Language::En),
            phrase(MessageKey::SelectTeacher, Language::Fr)
        );
    }

    #[test]
    fn test_step_phrases_match_protocol() {
        assert_eq!(
            phrase(MessageKey::AskLessonType, Language::En),
            "Would you like a trial or regular lesson?"
        );
        assert_eq!(phrase(MessageKey::SelectTeacher, Language::Zh), "請選擇老師。");
    }

    #[test]
    fn test_render_substitutes_params() {
        let mut params = HashMap::new();
        params.insert("name", "Emily Parker".to_string());
        assert_eq!(
            render(MessageKey::TeacherSelected, Language::En, &params),
            "You have selected teacher Emily Parker"
        );
    }

    #[test]
    fn test_lesson_type_labels() {
        assert_eq!(lesson_type_label(LessonType::Trial, Language::Zh), "體驗課");
        assert_eq!(
            lesson_type_label(LessonType::Regular, Language::En),
            "Regular Lesson"
        );
    }
}
