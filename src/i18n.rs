//! Display strings for the supported languages.
//!
//! Nothing here is global: callers pass the active [`Language`] to every lookup, so
//! switching language is just replacing one value in the UI state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ar")]
    Arabic,
    #[serde(rename = "fr")]
    French,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::Arabic, Language::French];

    /// Name of the language in that language, as shown on the switcher.
    pub fn native_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Arabic => "العربية",
            Language::French => "Français",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Arabic => "ar",
            Language::French => "fr",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code().eq_ignore_ascii_case(code))
    }

    pub fn text(self, msg: Msg) -> &'static str {
        match self {
            Language::English => english(msg),
            Language::Arabic => arabic(msg),
            Language::French => french(msg),
        }
    }

    /// Looks up `msg` and substitutes each `{}` with the next argument.
    pub fn format(self, msg: Msg, args: &[&dyn std::fmt::Display]) -> String {
        fill(self.text(msg), args)
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("unsupported language '{}' (expected en, ar or fr)", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    Title,
    Ready,
    SelectingServer,
    MeasuringLatency,
    TestingDownload,
    TestingUpload,
    LookingUp,
    Complete,
    DownloadLabel,
    UploadLabel,
    LatencyLabel,
    DownloadSpeed,
    UploadSpeed,
    Ping,
    IpLine,
    IpUnknown,
    Unknown,
    TestComplete,
    TestCompleteBody,
    Error,
    ConnectionError,
    GenericError,
    TestStopped,
    TestStoppedBody,
    AlreadyRunning,
    TimedOut,
    DownloadSeries,
    UploadSeries,
    PingColumn,
    TestNumber,
    SpeedAxis,
    ChartTitle,
    Export,
    Exported,
    NoData,
    RunFirst,
    ShareResults,
    ShareBody,
    SharePrompt,
    EnterEmail,
    Success,
    EmailSent,
    EmailFailed,
    SelectServer,
    EnterServer,
    ServerSelected,
    ServerSelectedBody,
    ServerAuto,
    NoServers,
    ServerListError,
    Settings,
    PingSamples,
    DownloadSize,
    UploadSize,
    HelpIdle,
    HelpRunning,
    HelpDialog,
    HelpPrompt,
    HelpSettings,
}

fn english(msg: Msg) -> &'static str {
    match msg {
        Msg::Title => "Internet Speed Test",
        Msg::Ready => "Ready",
        Msg::SelectingServer => "Selecting server...",
        Msg::MeasuringLatency => "Testing ping...",
        Msg::TestingDownload => "Testing download speed...",
        Msg::TestingUpload => "Testing upload speed...",
        Msg::LookingUp => "Looking up network info...",
        Msg::Complete => "Complete",
        Msg::DownloadLabel => "Download",
        Msg::UploadLabel => "Upload",
        Msg::LatencyLabel => "Ping",
        Msg::DownloadSpeed => "Download Speed: {} Mbps",
        Msg::UploadSpeed => "Upload Speed: {} Mbps",
        Msg::Ping => "Ping: {} ms",
        Msg::IpLine => "IP: {} | ISP: {} ({}, {})",
        Msg::IpUnknown => "IP: N/A",
        Msg::Unknown => "Unknown",
        Msg::TestComplete => "Test Complete",
        Msg::TestCompleteBody => "Speed test completed successfully!",
        Msg::Error => "Error",
        Msg::ConnectionError => "Failed to retrieve speedtest configuration. Check your internet connection.",
        Msg::GenericError => "An error occurred: {}",
        Msg::TestStopped => "Test Stopped",
        Msg::TestStoppedBody => "Speed test stopped by the user.",
        Msg::AlreadyRunning => "A speed test is already running.",
        Msg::TimedOut => "The speed test timed out after {} seconds.",
        Msg::DownloadSeries => "Download Speed (Mbps)",
        Msg::UploadSeries => "Upload Speed (Mbps)",
        Msg::PingColumn => "Ping (ms)",
        Msg::TestNumber => "Test Number",
        Msg::SpeedAxis => "Speed (Mbps)",
        Msg::ChartTitle => "Internet Speed Test Results",
        Msg::Export => "Export",
        Msg::Exported => "Results exported to {}",
        Msg::NoData => "No Data",
        Msg::RunFirst => "Run a speed test first!",
        Msg::ShareResults => "Share Results",
        Msg::ShareBody => "Download: {} Mbps\nUpload: {} Mbps\nPing: {} ms",
        Msg::SharePrompt => "Copy the results and share them on your social media:\n\n{}",
        Msg::EnterEmail => "Enter your email address:",
        Msg::Success => "Success",
        Msg::EmailSent => "Results sent successfully!",
        Msg::EmailFailed => "Failed to send email: {}",
        Msg::SelectServer => "Select Server",
        Msg::EnterServer => "Enter server ID (empty for automatic):",
        Msg::ServerSelected => "Server Selected",
        Msg::ServerSelectedBody => "Server {} selected.",
        Msg::ServerAuto => "The best server will be chosen automatically.",
        Msg::NoServers => "No servers found. Please check your internet connection.",
        Msg::ServerListError => "Failed to retrieve server list. Check your internet connection.",
        Msg::Settings => "Settings",
        Msg::PingSamples => "Ping samples",
        Msg::DownloadSize => "Download size",
        Msg::UploadSize => "Upload size",
        Msg::HelpIdle => "enter start · v server · e csv · j json · h share · m email · t theme · 1/2/3 lang · s settings · q quit",
        Msg::HelpRunning => "esc stop · q quit",
        Msg::HelpDialog => "enter close",
        Msg::HelpPrompt => "enter confirm · esc cancel",
        Msg::HelpSettings => "↑↓ select · ←→ adjust · enter done",
    }
}

fn arabic(msg: Msg) -> &'static str {
    match msg {
        Msg::Title => "اختبار سرعة الإنترنت",
        Msg::Ready => "جاهز",
        Msg::SelectingServer => "جارٍ اختيار الخادم...",
        Msg::MeasuringLatency => "جارٍ اختبار زمن الاستجابة...",
        Msg::TestingDownload => "جارٍ اختبار سرعة التنزيل...",
        Msg::TestingUpload => "جارٍ اختبار سرعة الرفع...",
        Msg::LookingUp => "جارٍ جلب معلومات الشبكة...",
        Msg::Complete => "اكتمل",
        Msg::DownloadLabel => "التنزيل",
        Msg::UploadLabel => "الرفع",
        Msg::LatencyLabel => "زمن الاستجابة",
        Msg::DownloadSpeed => "سرعة التنزيل: {} ميغابت/ث",
        Msg::UploadSpeed => "سرعة الرفع: {} ميغابت/ث",
        Msg::Ping => "زمن الاستجابة: {} مللي ثانية",
        Msg::IpLine => "IP: {} | المزود: {} ({}, {})",
        Msg::IpUnknown => "IP: غير متاح",
        Msg::Unknown => "غير معروف",
        Msg::TestComplete => "اكتمل الاختبار",
        Msg::TestCompleteBody => "اكتمل اختبار السرعة بنجاح!",
        Msg::Error => "خطأ",
        Msg::ConnectionError => "تعذر جلب إعدادات اختبار السرعة. تحقق من اتصالك بالإنترنت.",
        Msg::GenericError => "حدث خطأ: {}",
        Msg::TestStopped => "توقف الاختبار",
        Msg::TestStoppedBody => "أوقف المستخدم اختبار السرعة.",
        Msg::AlreadyRunning => "اختبار السرعة قيد التشغيل بالفعل.",
        Msg::TimedOut => "انتهت مهلة اختبار السرعة بعد {} ثانية.",
        Msg::DownloadSeries => "سرعة التنزيل (ميغابت/ث)",
        Msg::UploadSeries => "سرعة الرفع (ميغابت/ث)",
        Msg::PingColumn => "زمن الاستجابة (مللي ثانية)",
        Msg::TestNumber => "رقم الاختبار",
        Msg::SpeedAxis => "السرعة (ميغابت/ث)",
        Msg::ChartTitle => "نتائج اختبار سرعة الإنترنت",
        Msg::Export => "تصدير",
        Msg::Exported => "تم تصدير النتائج إلى {}",
        Msg::NoData => "لا توجد بيانات",
        Msg::RunFirst => "قم بإجراء اختبار السرعة أولاً!",
        Msg::ShareResults => "مشاركة النتائج",
        Msg::ShareBody => "التنزيل: {} ميغابت/ث\nالرفع: {} ميغابت/ث\nزمن الاستجابة: {} مللي ثانية",
        Msg::SharePrompt => "انسخ النتائج وشاركها على وسائل التواصل الاجتماعي:\n\n{}",
        Msg::EnterEmail => "أدخل بريدك الإلكتروني:",
        Msg::Success => "نجاح",
        Msg::EmailSent => "تم إرسال النتائج بنجاح!",
        Msg::EmailFailed => "فشل إرسال البريد الإلكتروني: {}",
        Msg::SelectServer => "اختيار الخادم",
        Msg::EnterServer => "أدخل معرف الخادم (اتركه فارغاً للاختيار التلقائي):",
        Msg::ServerSelected => "تم اختيار الخادم",
        Msg::ServerSelectedBody => "تم اختيار الخادم {}.",
        Msg::ServerAuto => "سيتم اختيار أفضل خادم تلقائياً.",
        Msg::NoServers => "لم يتم العثور على خوادم. يرجى التحقق من اتصالك بالإنترنت.",
        Msg::ServerListError => "تعذر جلب قائمة الخوادم. تحقق من اتصالك بالإنترنت.",
        Msg::Settings => "الإعدادات",
        Msg::PingSamples => "عينات زمن الاستجابة",
        Msg::DownloadSize => "حجم التنزيل",
        Msg::UploadSize => "حجم الرفع",
        Msg::HelpIdle => "enter بدء · v خادم · e csv · j json · h مشاركة · m بريد · t مظهر · 1/2/3 لغة · s إعدادات · q خروج",
        Msg::HelpRunning => "esc إيقاف · q خروج",
        Msg::HelpDialog => "enter إغلاق",
        Msg::HelpPrompt => "enter تأكيد · esc إلغاء",
        Msg::HelpSettings => "↑↓ اختيار · ←→ تعديل · enter تم",
    }
}

fn french(msg: Msg) -> &'static str {
    match msg {
        Msg::Title => "Test de vitesse Internet",
        Msg::Ready => "Prêt",
        Msg::SelectingServer => "Sélection du serveur...",
        Msg::MeasuringLatency => "Test du ping...",
        Msg::TestingDownload => "Test du débit descendant...",
        Msg::TestingUpload => "Test du débit montant...",
        Msg::LookingUp => "Recherche des informations réseau...",
        Msg::Complete => "Terminé",
        Msg::DownloadLabel => "Téléchargement",
        Msg::UploadLabel => "Envoi",
        Msg::LatencyLabel => "Ping",
        Msg::DownloadSpeed => "Débit descendant : {} Mbps",
        Msg::UploadSpeed => "Débit montant : {} Mbps",
        Msg::Ping => "Ping : {} ms",
        Msg::IpLine => "IP : {} | FAI : {} ({}, {})",
        Msg::IpUnknown => "IP : N/D",
        Msg::Unknown => "Inconnu",
        Msg::TestComplete => "Test terminé",
        Msg::TestCompleteBody => "Le test de vitesse s'est terminé avec succès !",
        Msg::Error => "Erreur",
        Msg::ConnectionError => "Impossible de récupérer la configuration du test. Vérifiez votre connexion Internet.",
        Msg::GenericError => "Une erreur s'est produite : {}",
        Msg::TestStopped => "Test arrêté",
        Msg::TestStoppedBody => "Test de vitesse arrêté par l'utilisateur.",
        Msg::AlreadyRunning => "Un test de vitesse est déjà en cours.",
        Msg::TimedOut => "Le test de vitesse a expiré après {} secondes.",
        Msg::DownloadSeries => "Débit descendant (Mbps)",
        Msg::UploadSeries => "Débit montant (Mbps)",
        Msg::PingColumn => "Ping (ms)",
        Msg::TestNumber => "Numéro du test",
        Msg::SpeedAxis => "Débit (Mbps)",
        Msg::ChartTitle => "Résultats des tests de vitesse",
        Msg::Export => "Exporter",
        Msg::Exported => "Résultats exportés vers {}",
        Msg::NoData => "Aucune donnée",
        Msg::RunFirst => "Lancez d'abord un test de vitesse !",
        Msg::ShareResults => "Partager les résultats",
        Msg::ShareBody => "Téléchargement : {} Mbps\nEnvoi : {} Mbps\nPing : {} ms",
        Msg::SharePrompt => "Copiez les résultats et partagez-les sur vos réseaux sociaux :\n\n{}",
        Msg::EnterEmail => "Entrez votre adresse e-mail :",
        Msg::Success => "Succès",
        Msg::EmailSent => "Résultats envoyés avec succès !",
        Msg::EmailFailed => "Échec de l'envoi de l'e-mail : {}",
        Msg::SelectServer => "Choisir un serveur",
        Msg::EnterServer => "Entrez l'identifiant du serveur (vide pour automatique) :",
        Msg::ServerSelected => "Serveur choisi",
        Msg::ServerSelectedBody => "Serveur {} sélectionné.",
        Msg::ServerAuto => "Le meilleur serveur sera choisi automatiquement.",
        Msg::NoServers => "Aucun serveur trouvé. Vérifiez votre connexion Internet.",
        Msg::ServerListError => "Impossible de récupérer la liste des serveurs. Vérifiez votre connexion Internet.",
        Msg::Settings => "Paramètres",
        Msg::PingSamples => "Échantillons ping",
        Msg::DownloadSize => "Taille descendante",
        Msg::UploadSize => "Taille montante",
        Msg::HelpIdle => "entrée lancer · v serveur · e csv · j json · h partager · m e-mail · t thème · 1/2/3 langue · s paramètres · q quitter",
        Msg::HelpRunning => "échap arrêter · q quitter",
        Msg::HelpDialog => "entrée fermer",
        Msg::HelpPrompt => "entrée valider · échap annuler",
        Msg::HelpSettings => "↑↓ choisir · ←→ ajuster · entrée terminé",
    }
}

fn fill(template: &str, args: &[&dyn std::fmt::Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(&arg.to_string()),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_placeholders_in_order() {
        let text = Language::English.format(Msg::ShareBody, &[&50.2, &10.1, &15]);
        assert_eq!(text, "Download: 50.2 Mbps\nUpload: 10.1 Mbps\nPing: 15 ms");
    }

    #[test]
    fn missing_arguments_leave_placeholder() {
        assert_eq!(fill("a {} b {}", &[&1]), "a 1 b {}");
    }

    #[test]
    fn lookups_follow_the_given_language() {
        assert_eq!(Language::French.text(Msg::Unknown), "Inconnu");
        assert_eq!(Language::Arabic.text(Msg::Unknown), "غير معروف");
        assert_eq!(Language::English.text(Msg::Unknown), "Unknown");
    }

    #[test]
    fn connectivity_failure_mentions_connection() {
        assert!(Language::English.text(Msg::ConnectionError).contains("connection"));
    }

    #[test]
    fn parses_language_codes() {
        assert_eq!("FR".parse::<Language>().unwrap(), Language::French);
        assert!("de".parse::<Language>().is_err());
    }
}
