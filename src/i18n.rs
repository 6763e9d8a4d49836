//! User-facing messages in English, German and Turkish

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    #[value(name = "en")]
    English,

    #[serde(rename = "de")]
    #[value(name = "de")]
    German,

    #[serde(rename = "tr")]
    #[value(name = "tr")]
    Turkish,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::German => "de",
            Language::Turkish => "tr",
        }
    }

    /// Name of the language in its own script
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::German => "Deutsch",
            Language::Turkish => "Türkçe",
        }
    }

    pub fn all() -> &'static [Language] {
        &[Language::English, Language::German, Language::Turkish]
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|lang| lang.code().eq_ignore_ascii_case(code))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    Ready,
    Success,
    Error,
    Warning,
    SelectPort,
    SelectPic,
    SelectHex,
    HexFileTooLarge,
    SpecifyOutput,
    OperationCompleted,
    OperationCompletedWithWarnings,
    OperationFailed,
    OperationCancelled,
    PortBusy,
    DetectingDevices,
    DeviceFound,
    NoDeviceFound,
    BackendValid,
    BackendInvalid,
    BackendNotFound,
}

impl Message {
    pub const ALL: &'static [Message] = &[
        Message::Ready,
        Message::Success,
        Message::Error,
        Message::Warning,
        Message::SelectPort,
        Message::SelectPic,
        Message::SelectHex,
        Message::HexFileTooLarge,
        Message::SpecifyOutput,
        Message::OperationCompleted,
        Message::OperationCompletedWithWarnings,
        Message::OperationFailed,
        Message::OperationCancelled,
        Message::PortBusy,
        Message::DetectingDevices,
        Message::DeviceFound,
        Message::NoDeviceFound,
        Message::BackendValid,
        Message::BackendInvalid,
        Message::BackendNotFound,
    ];
}

pub fn translate(lang: Language, message: Message) -> &'static str {
    match lang {
        Language::English => english(message),
        Language::German => german(message),
        Language::Turkish => turkish(message),
    }
}

fn english(message: Message) -> &'static str {
    match message {
        Message::Ready => "Ready",
        Message::Success => "Success",
        Message::Error => "Error",
        Message::Warning => "Warning",
        Message::SelectPort => "Please select a serial port",
        Message::SelectPic => "Please select a PIC type",
        Message::SelectHex => "Please select a HEX file",
        Message::HexFileTooLarge => "HEX file is too large for selected chip",
        Message::SpecifyOutput => "Please specify an output file",
        Message::OperationCompleted => "Operation completed successfully!",
        Message::OperationCompletedWithWarnings => "Operation completed with warnings",
        Message::OperationFailed => "Operation failed!",
        Message::OperationCancelled => "Operation cancelled",
        Message::PortBusy => "Serial port is busy",
        Message::DetectingDevices => "Detecting devices...",
        Message::DeviceFound => "Device found",
        Message::NoDeviceFound => "No compatible device found",
        Message::BackendValid => "Backend executable is valid",
        Message::BackendInvalid => "Invalid backend executable",
        Message::BackendNotFound => "Backend not found",
    }
}

fn german(message: Message) -> &'static str {
    match message {
        Message::Ready => "Bereit",
        Message::Success => "Erfolgreich",
        Message::Error => "Fehler",
        Message::Warning => "Warnung",
        Message::SelectPort => "Bitte wählen Sie eine serielle Schnittstelle",
        Message::SelectPic => "Bitte wählen Sie einen PIC-Typ",
        Message::SelectHex => "Bitte wählen Sie eine HEX-Datei",
        Message::HexFileTooLarge => "HEX-Datei ist zu groß für den gewählten Chip",
        Message::SpecifyOutput => "Bitte geben Sie eine Ausgabedatei an",
        Message::OperationCompleted => "Operation abgeschlossen",
        Message::OperationCompletedWithWarnings => "Operation mit Warnungen abgeschlossen",
        Message::OperationFailed => "Operation fehlgeschlagen",
        Message::OperationCancelled => "Operation abgebrochen",
        Message::PortBusy => "Serielle Schnittstelle ist belegt",
        Message::DetectingDevices => "Geräte werden erkannt...",
        Message::DeviceFound => "Gerät gefunden",
        Message::NoDeviceFound => "Kein Gerät gefunden",
        Message::BackendValid => "Backend ausführbar ist gültig",
        Message::BackendInvalid => "Ungültiges Backend ausführbar",
        Message::BackendNotFound => "Backend nicht gefunden",
    }
}

fn turkish(message: Message) -> &'static str {
    match message {
        Message::Ready => "Hazır",
        Message::Success => "Başarılı",
        Message::Error => "Hata",
        Message::Warning => "Uyarı",
        Message::SelectPort => "Lütfen bir seri port seçin",
        Message::SelectPic => "Lütfen bir PIC türü seçin",
        Message::SelectHex => "Lütfen bir HEX dosyası seçin",
        Message::HexFileTooLarge => "HEX dosyası seçilen çip için çok büyük",
        Message::SpecifyOutput => "Lütfen bir çıktı dosyası belirtin",
        Message::OperationCompleted => "İşlem tamamlandı",
        Message::OperationCompletedWithWarnings => "İşlem uyarılarla tamamlandı",
        Message::OperationFailed => "İşlem başarısız",
        Message::OperationCancelled => "İşlem iptal edildi",
        Message::PortBusy => "Seri port meşgul",
        Message::DetectingDevices => "Cihazlar algılanıyor...",
        Message::DeviceFound => "Cihaz bulundu",
        Message::NoDeviceFound => "Cihaz bulunamadı",
        Message::BackendValid => "Backend çalıştırılabilir geçerli",
        Message::BackendInvalid => "Geçersiz backend çalıştırılabilir",
        Message::BackendNotFound => "Backend bulunamadı",
    }
}
