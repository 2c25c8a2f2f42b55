use chrono::Local;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use attendance_checkin::camera::StillImageCamera;
use attendance_checkin::capture::{Capabilities, CaptureController};
use attendance_checkin::config::{self, CheckinConfig, GatewayConfig};
use attendance_checkin::credentials::{navigate, LoginError, LoginForm, Page, SignupForm};
use attendance_checkin::dashboard::{
    format_coordinates, format_timestamp, records_from_envelope, render_department_chart,
    summarize,
};
use attendance_checkin::device::{FixedGeolocation, HttpIpLookup, HttpReverseGeocoder};
use attendance_checkin::record::Department;
use attendance_checkin::serve::serve_gateway;
use attendance_checkin::session::{FileStore, SessionRepository, UserSession};
use attendance_checkin::submission::GatewayClient;

#[derive(Parser, Debug)]
#[command(author, version, about = "Selfie attendance check-in with a relaying gateway")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the submission gateway
    Gateway {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Log in with a demo account
    Login {
        /// Path to check-in config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        email: String,

        #[arg(short = 'w', long)]
        password: String,
    },
    /// Validate a new account form
    Signup {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short = 'w', long)]
        password: String,

        /// Password repeated
        #[arg(long)]
        confirm_password: String,
    },
    /// Forget the stored session
    Logout {
        /// Path to check-in config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored session
    Whoami {
        /// Path to check-in config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Capture a photo and submit attendance
    Checkin {
        /// Path to check-in config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Image file used as the camera frame
        #[arg(long)]
        photo: PathBuf,

        /// Department (overrides config file)
        #[arg(short, long, value_enum)]
        department: Option<Department>,

        /// User id (default: random USR id)
        #[arg(short, long)]
        user_id: Option<String>,
    },
    /// Show submitted records with per-department totals (admin only)
    Dashboard {
        /// Path to check-in config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Gateway { config, port } => gateway(config, port),
        Command::Login {
            config,
            email,
            password,
        } => login(config, email, password),
        Command::Signup {
            name,
            email,
            password,
            confirm_password,
        } => signup(SignupForm {
            name,
            email,
            password,
            confirm_password,
        }),
        Command::Logout { config } => logout(config),
        Command::Whoami { config } => whoami(config),
        Command::Checkin {
            config,
            photo,
            department,
            user_id,
        } => checkin(config, photo, department, user_id),
        Command::Dashboard { config } => dashboard(config),
    }
}

fn gateway(config_path: PathBuf, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let config: GatewayConfig = config::load(&config_path)?;
    let remote_url = config.validate()?;
    serve_gateway(remote_url, port.unwrap_or(config.port), config.timeout())
}

fn load_checkin_config(path: &PathBuf) -> Result<CheckinConfig, Box<dyn std::error::Error>> {
    let config: CheckinConfig = config::load(path)?;
    config.validate()?;
    Ok(config)
}

fn session_repository(config: &CheckinConfig) -> SessionRepository<FileStore> {
    let path = config
        .storage_file
        .clone()
        .unwrap_or_else(FileStore::default_path);
    SessionRepository::new(FileStore::new(path))
}

/// Stored session, if it may open `page`
fn require_page(
    sessions: &mut SessionRepository<FileStore>,
    page: Page,
) -> Result<UserSession, Box<dyn std::error::Error>> {
    let session = sessions.load();
    match navigate(session.as_ref(), page) {
        Some(granted) if granted == page => session.ok_or_else(|| "Not logged in".into()),
        Some(_) => Err("Not logged in. Run `login` first.".into()),
        None => Err(format!("Access to the {:?} page is not allowed for this account", page).into()),
    }
}

fn login(
    config_path: PathBuf,
    email: String,
    password: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_checkin_config(&config_path)?;
    let form = LoginForm { email, password };

    let session = match form.login() {
        Ok(session) => session,
        Err(LoginError::Invalid(errors)) => {
            for (field, message) in &errors {
                eprintln!("  {}: {}", field, message);
            }
            return Err(LoginError::Invalid(errors).into());
        }
        Err(e) => return Err(e.into()),
    };

    session_repository(&config).save(&session)?;
    info!("Logged in {} as {:?}", session.email, session.role);
    println!("Logged in as {} ({:?})", session.email, session.role);
    Ok(())
}

fn signup(form: SignupForm) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = form.signup() {
        if let LoginError::Invalid(errors) = &e {
            for (field, message) in errors {
                eprintln!("  {}: {}", field, message);
            }
        }
        return Err(e.into());
    }
    info!("Sign-up form accepted for {}", form.email);
    println!("Account created successfully! You can now login.");
    Ok(())
}

fn logout(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_checkin_config(&config_path)?;
    session_repository(&config).clear();
    println!("Logged out");
    Ok(())
}

fn whoami(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_checkin_config(&config_path)?;
    match session_repository(&config).load() {
        Some(session) => println!(
            "{} ({:?}), logged in {}",
            session.email,
            session.role,
            session.login_time.to_rfc3339()
        ),
        None => println!("Not logged in"),
    }
    Ok(())
}

fn checkin(
    config_path: PathBuf,
    photo: PathBuf,
    department: Option<Department>,
    user_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_checkin_config(&config_path)?;
    let session = require_page(&mut session_repository(&config), Page::User)?;
    info!("Check-in for {}", session.email);

    let http = reqwest::Client::new();
    let geolocation = match config.position {
        Some(p) => FixedGeolocation::new(p.latitude, p.longitude, p.accuracy),
        None => FixedGeolocation::unavailable(),
    };
    let caps = Capabilities {
        camera: StillImageCamera::new(photo),
        geolocation,
        geocoder: HttpReverseGeocoder::new(http.clone(), config.reverse_geocode_url.clone()),
        ip_lookup: HttpIpLookup::new(http, config.ip_echo_url.clone()),
        submitter: GatewayClient::new(&config.gateway_url)?,
    };
    let user_agent = config.user_agent.clone().unwrap_or_else(|| {
        format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    });

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut controller = CaptureController::new(caps, &user_agent);
        controller.initialize().await;

        println!("User ID: {}", controller.user_id());
        println!("Device: {}", controller.device());
        println!("IP: {}", controller.ip_address().unwrap_or("Loading..."));
        match (controller.location_info(), controller.location_error()) {
            (Some(location), _) => println!(
                "Location: {:.4}, {:.4} ({})",
                location.latitude,
                location.longitude,
                location.address.as_deref().unwrap_or("")
            ),
            (None, Some(e)) => println!("Location: {}", e),
            (None, None) => println!("Location required"),
        }

        if let Some(user_id) = user_id {
            controller.set_user_id(user_id);
        }
        controller.select_department(department.or(config.department));

        controller.start_camera().await?;
        controller.capture()?;
        let response = controller.submit().await?;

        println!("Attendance submitted successfully");
        info!("Gateway response: {}", response);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn dashboard(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_checkin_config(&config_path)?;
    require_page(&mut session_repository(&config), Page::Admin)?;

    let client = GatewayClient::new(&config.gateway_url)?;
    let rt = tokio::runtime::Runtime::new()?;
    let envelope = rt.block_on(client.fetch_records())?;
    let records = records_from_envelope(&envelope)?;

    let now = Local::now();
    let summary = summarize(&records, &now);

    println!("Total check-ins: {}", summary.total);
    println!("Today: {}", summary.today);
    println!("Departments: {}", summary.department_count());
    println!();
    print!("{}", render_department_chart(&summary, 40));
    println!();
    for record in &records {
        println!(
            "{:<10} {:<12} {:<18} {:<26} {:<30} {}",
            record.id,
            record.department,
            format_timestamp(&record.timestamp, &Local),
            format_coordinates(&record.location),
            record.location_address,
            record.ip_address
        );
    }
    println!("Showing {} entries", records.len());
    Ok(())
}
