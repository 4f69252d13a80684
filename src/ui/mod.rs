use crate::core::state::{BackgroundMode, Gender, PersonaField};
use crate::services::studio::Studio;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, InquireError, Select, Text};
use std::fmt;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    EditField,
    ReferenceImage,
    ReferenceAudio,
    Script,
    Generate,
    ShowResult,
    ViewImage,
    Play,
    Stop,
    Download,
    Upload,
    History,
    ClearHistory,
    Quit,
}

impl Action {
    const ALL: [Action; 14] = [
        Action::EditField,
        Action::ReferenceImage,
        Action::ReferenceAudio,
        Action::Script,
        Action::Generate,
        Action::ShowResult,
        Action::ViewImage,
        Action::Play,
        Action::Stop,
        Action::Download,
        Action::Upload,
        Action::History,
        Action::ClearHistory,
        Action::Quit,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::EditField => "Edit persona",
            Action::ReferenceImage => "Reference image",
            Action::ReferenceAudio => "Reference voice",
            Action::Script => "Edit script",
            Action::Generate => "Generate",
            Action::ShowResult => "Show current result",
            Action::ViewImage => "View image",
            Action::Play => "Play voice",
            Action::Stop => "Stop playback",
            Action::Download => "Download all",
            Action::Upload => "Upload to Google Drive",
            Action::History => "Session history",
            Action::ClearHistory => "Clear history",
            Action::Quit => "Quit",
        };
        f.write_str(label)
    }
}

/// Esc on a sub-prompt goes back to the menu instead of failing.
fn cancelled<T>(result: std::result::Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn run(studio: &mut Studio) -> Result<()> {
    println!("Character Studio");
    println!("{}\n", studio.persona.card());

    loop {
        let action = match Select::new("What next?", Action::ALL.to_vec())
            .with_page_size(14)
            .prompt()
        {
            Ok(action) => action,
            Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => {
                Action::Quit
            }
            Err(e) => return Err(e.into()),
        };

        if action == Action::Quit {
            studio.close_windows().await;
            break;
        }

        if let Err(e) = handle(studio, action).await {
            eprintln!("Error: {:#}", e);
        }
    }

    Ok(())
}

async fn handle(studio: &mut Studio, action: Action) -> Result<()> {
    match action {
        Action::EditField => edit_field(studio)?,
        Action::ReferenceImage => {
            if let Some(path) = ask_path("Reference image path or data URL (empty to clear):")? {
                match path {
                    Some(path) => studio.set_reference_image(&path).await?,
                    None => studio.persona.reference_image = None,
                }
            }
        }
        Action::ReferenceAudio => {
            if let Some(path) = ask_path("Reference voice path or data URL (empty to clear):")? {
                match path {
                    Some(path) => studio.set_reference_audio(&path).await?,
                    None => studio.persona.reference_audio = None,
                }
            }
        }
        Action::Script => {
            if let Some(script) = cancelled(
                Text::new("Script:")
                    .with_initial_value(&studio.script)
                    .prompt(),
            )? {
                studio.script = script;
            }
        }
        Action::Generate => generate(studio).await?,
        Action::ShowResult => show_current(studio),
        Action::ViewImage => view_image(studio).await?,
        Action::Play => {
            let buffer = studio.play_current().await?;
            println!("Playing {:.1}s of audio", buffer.duration().as_secs_f32());
        }
        Action::Stop => studio.stop_playback().await,
        Action::Download => {
            for path in studio.download_current().await? {
                println!("Saved {}", path);
            }
        }
        Action::Upload => {
            let ids = studio.upload_current().await?;
            println!("Uploaded {} files to Google Drive", ids.len());
        }
        Action::History => pick_history(studio)?,
        Action::ClearHistory => {
            if studio.history().is_empty() {
                println!("History is empty.");
            } else if cancelled(
                Confirm::new("Clear the whole session history?")
                    .with_default(false)
                    .prompt(),
            )? == Some(true)
            {
                studio.clear_history();
            }
        }
        Action::Quit => {}
    }
    Ok(())
}

/// `None` when cancelled, `Some(None)` when left empty.
fn ask_path(message: &str) -> Result<Option<Option<String>>> {
    Ok(cancelled(Text::new(message).prompt())?.map(|p| {
        let p = p.trim().to_string();
        if p.is_empty() {
            None
        } else {
            Some(p)
        }
    }))
}

fn edit_field(studio: &mut Studio) -> Result<()> {
    let Some(field) = cancelled(
        Select::new("Field:", PersonaField::ALL.to_vec())
            .with_page_size(13)
            .prompt(),
    )?
    else {
        return Ok(());
    };

    let value = match field {
        PersonaField::Gender => {
            cancelled(Select::new("Gender:", Gender::ALL.to_vec()).prompt())?.map(|g| g.to_string())
        }
        PersonaField::BackgroundMode => {
            cancelled(Select::new("Background mode:", BackgroundMode::ALL.to_vec()).prompt())?
                .map(|m| m.as_str().to_string())
        }
        _ => {
            let current = studio.persona.field(field);
            cancelled(
                Text::new(&format!("{}:", field.label()))
                    .with_initial_value(&current)
                    .prompt(),
            )?
        }
    };

    if let Some(value) = value {
        studio.persona.set_field(field, &value)?;
    }
    Ok(())
}

async fn generate(studio: &mut Studio) -> Result<()> {
    if !studio.can_generate() {
        println!("A name and a script are required before generating.");
        return Ok(());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Generating {}...", studio.persona.name));
    pb.enable_steady_tick(Duration::from_millis(120));

    let outcome = studio.generate().await;
    pb.finish_and_clear();

    if outcome?.is_some() {
        show_current(studio);
    }
    Ok(())
}

fn show_current(studio: &Studio) {
    let Some(result) = studio.current() else {
        println!("No result yet.");
        return;
    };

    println!("\n== {} ({}) ==", result.name, result.date);
    println!("{}", result.persona.card());
    for (i, image) in result.images.iter().enumerate() {
        println!("  image {}: {} ({} bytes base64)", i + 1, image.mime_type, image.data.len());
    }
    match &result.audio_base64 {
        Some(_) => println!("  voice: ready"),
        None => println!("  voice: none"),
    }
    println!("Prompt: {}\n", result.used_prompt);
}

async fn view_image(studio: &Studio) -> Result<()> {
    let Some(result) = studio.current() else {
        println!("No result yet.");
        return Ok(());
    };
    let labels: Vec<String> = result
        .images
        .iter()
        .enumerate()
        .map(|(i, image)| format!("Shot {} ({})", i + 1, image.mime_type))
        .collect();

    let Some(choice) = cancelled(Select::new("Image:", labels).raw_prompt())? else {
        return Ok(());
    };
    let path = studio.view_image(choice.index).await?;
    println!("Opened {}", path.display());
    Ok(())
}

fn pick_history(studio: &mut Studio) -> Result<()> {
    if studio.history().is_empty() {
        println!("History is empty.");
        return Ok(());
    }

    let active = studio.history().active_id();
    let labels: Vec<String> = studio
        .history()
        .entries()
        .iter()
        .map(|r| {
            let marker = if Some(r.id) == active { "*" } else { " " };
            format!("{} {} {}", marker, r.date, r.name)
        })
        .collect();
    let ids: Vec<i64> = studio.history().entries().iter().map(|r| r.id).collect();

    let Some(choice) = cancelled(Select::new("Restore:", labels).raw_prompt())? else {
        return Ok(());
    };
    if studio.select(ids[choice.index]) {
        show_current(studio);
    }
    Ok(())
}
