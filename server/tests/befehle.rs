//! Befehle und Gateway gegen eine vollstaendig verdrahtete Sitzungs-Verwaltung

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use grussbot_audio::{AudioAufloeser, AudioResult, FrameListe, FrameQuelle, QuellenArt, TrackAnfrage};
use grussbot_core::{ChannelId, Kanal, Mitglied, SessionId};
use grussbot_server::befehle::{BefehlsAufruf, BefehlsRegister};
use grussbot_server::config::BotConfig;
use grussbot_server::gateway::{Gateway, GatewayStatistik};
use grussbot_server::transport::ProtokollTransport;
use grussbot_server::{Komponenten, Server};
use grussbot_voice::SitzungsVerwaltung;
use tempfile::TempDir;

const SITZUNG: SessionId = SessionId(3);
const ADMIN: u64 = 42;

struct LangeTracks;

impl AudioAufloeser for LangeTracks {
    fn aufloesen(&self, _anfrage: &TrackAnfrage) -> AudioResult<Box<dyn FrameQuelle>> {
        Ok(Box::new(FrameListe::neu(
            std::iter::repeat(Bytes::from_static(b"opus")).take(5000),
        )))
    }
}

struct Umgebung {
    _dir: TempDir,
    liste: std::path::PathBuf,
    transport: Arc<ProtokollTransport>,
    verwaltung: SitzungsVerwaltung,
    befehle: Arc<BefehlsRegister>,
}

fn umgebung() -> Umgebung {
    let dir = tempfile::tempdir().unwrap();
    let abspielen = dir.path().join("abspielen");
    std::fs::create_dir(&abspielen).unwrap();
    for name in ["tromba.opus", "Anthem.opus"] {
        std::fs::write(abspielen.join(name), b"").unwrap();
    }
    let liste = dir.path().join("kanalliste.txt");

    let mut config = BotConfig::default();
    config.bot.bot_id = 1;
    config.bot.admins = vec![ADMIN];
    config.kanalliste.datei = liste.clone();
    config.audio.samples.abspielen = Some(abspielen);
    config.zufall.seed = Some(5);

    let transport = ProtokollTransport::neu();
    let Komponenten {
        verwaltung,
        befehle,
    } = Server::neu(config)
        .komponenten(transport.clone(), Arc::new(LangeTracks))
        .unwrap();

    Umgebung {
        _dir: dir,
        liste,
        transport,
        verwaltung,
        befehle,
    }
}

fn general() -> Kanal {
    Kanal::neu(10, "General", vec![Mitglied::neu(7, "anna")])
}

fn aufruf(mitglied: u64, name: &str, argument: Option<&str>, kanal: Option<Kanal>) -> BefehlsAufruf {
    BefehlsAufruf {
        sitzung: SITZUNG,
        mitglied: Mitglied::neu(mitglied, "anna"),
        kanal,
        name: name.into(),
        argument: argument.map(str::to_string),
    }
}

#[tokio::test]
async fn hilfe_und_sample_liste() {
    let u = umgebung();
    let text = u.befehle.ausfuehren(&aufruf(7, "hilfe", None, None)).unwrap();
    assert!(text.contains("kanalverwaltung"));

    let text = u.befehle.ausfuehren(&aufruf(7, "abspielen", None, None)).unwrap();
    assert_eq!(text, "Verfuegbare Samples: Anthem, tromba");
}

#[tokio::test]
async fn tts_verbindet_mit_dem_kanal_des_aufrufers() {
    let u = umgebung();

    let fehler = u
        .befehle
        .ausfuehren(&aufruf(7, "tts", Some("ciao"), None))
        .unwrap_err();
    assert!(fehler.ist_benutzerfehler());
    assert_eq!(u.transport.kanal(SITZUNG), None);

    u.befehle
        .ausfuehren(&aufruf(7, "tts", Some("ciao a tutti"), Some(general())))
        .unwrap();
    assert_eq!(u.transport.kanal(SITZUNG), Some(ChannelId(10)));

    let beobachter = u.verwaltung.sitzung(SITZUNG).unwrap();
    let aktiv = beobachter.wiedergabe().aktiver_track().unwrap();
    assert_eq!(aktiv.art(), QuellenArt::Sprache);
    assert_eq!(aktiv.sprachtext().as_deref(), Some("ciao a tutti"));
}

#[tokio::test]
async fn abspielen_bekannter_und_unbekannter_samples() {
    let u = umgebung();

    let fehler = u
        .befehle
        .ausfuehren(&aufruf(7, "abspielen", Some("trombone"), Some(general())))
        .unwrap_err();
    assert!(fehler.to_string().contains("Sample nicht gefunden"));
    // Unbekanntes Sample verbindet nicht
    assert_eq!(u.transport.kanal(SITZUNG), None);

    let text = u
        .befehle
        .ausfuehren(&aufruf(7, "abspielen", Some("TROMBA"), Some(general())))
        .unwrap();
    assert_eq!(text, "Spiele tromba");

    let beobachter = u.verwaltung.sitzung(SITZUNG).unwrap();
    let aktiv = beobachter.wiedergabe().aktiver_track().unwrap();
    assert_eq!(aktiv.anzeigename(), "tromba");
}

#[tokio::test]
async fn kanalverwaltung_nur_fuer_admins() {
    let u = umgebung();
    u.befehle
        .ausfuehren(&aufruf(7, "tts", Some("hallo"), Some(general())))
        .unwrap();

    let fehler = u
        .befehle
        .ausfuehren(&aufruf(7, "kanalverwaltung", Some("General"), None))
        .unwrap_err();
    assert!(fehler.to_string().contains("Zugriff verweigert"));
    assert!(!u.liste.exists());

    // Sperren des aktuellen Kanals trennt die Sitzung
    let text = u
        .befehle
        .ausfuehren(&aufruf(ADMIN, "kanalverwaltung", Some("General 🎤"), None))
        .unwrap();
    assert!(text.contains("gesperrt"));
    assert_eq!(u.transport.kanal(SITZUNG), None);
    assert_eq!(std::fs::read_to_string(&u.liste).unwrap().trim(), "General");

    let fehler = u
        .befehle
        .ausfuehren(&aufruf(7, "tts", Some("hallo"), Some(general())))
        .unwrap_err();
    assert!(fehler.to_string().contains("Kanal gesperrt"));

    let text = u
        .befehle
        .ausfuehren(&aufruf(ADMIN, "kanalverwaltung", Some("General"), None))
        .unwrap();
    assert!(text.contains("freigegeben"));
}

#[tokio::test]
async fn gateway_verarbeitet_zeilen() {
    let u = umgebung();
    let gateway = Gateway::neu(u.verwaltung.clone(), u.befehle.clone());

    let eingabe = concat!(
        "# Testlauf\n",
        r#"{"art":"uebergang","sitzung":3,"mitglied":{"id":7,"name":"anna"},"beigetreten":{"id":10,"name":"General","mitglieder":[{"id":7,"name":"anna"}]}}"#,
        "\n",
        r#"{"art":"befehl","sitzung":3,"mitglied":{"id":7,"name":"anna"},"name":"hilfe"}"#,
        "\n",
        "kein json\n",
        "\n",
    );
    let mut ausgabe: Vec<u8> = Vec::new();
    let statistik = gateway
        .laufen(eingabe.as_bytes(), &mut ausgabe)
        .await
        .unwrap();
    assert_eq!(
        statistik,
        GatewayStatistik {
            uebergaenge: 1,
            befehle: 1,
            verworfen: 1,
        }
    );

    let ausgabe = String::from_utf8(ausgabe).unwrap();
    let zeilen: Vec<&str> = ausgabe.lines().collect();
    assert_eq!(zeilen.len(), 1);
    let antwort: serde_json::Value = serde_json::from_str(zeilen[0]).unwrap();
    assert_eq!(antwort["sitzung"], 3);
    assert_eq!(antwort["fehler"], false);
    assert!(antwort["text"].as_str().unwrap().starts_with("Befehle:"));

    // Der Uebergang laeuft ueber den Sitzungs-Worker
    for _ in 0..100 {
        if u.transport.kanal(SITZUNG).is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(u.transport.kanal(SITZUNG), Some(ChannelId(10)));
    u.verwaltung.alle_beenden();
    assert_eq!(u.transport.kanal(SITZUNG), None);
}
