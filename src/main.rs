use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::Result;

use staysync::model::{quote_total, Property};
use staysync::{
  filter_properties, BookingDraft, CachedClient, Config, Error, MemoryStorage, QuerySnapshot,
  RestApi, User,
};

#[derive(Parser, Debug)]
#[command(name = "staysync")]
#[command(about = "Browse and book rental properties, with an offline-friendly local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/staysync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, overriding the config file
  #[arg(long)]
  base_url: Option<String>,

  /// User id for booking and profile commands
  #[arg(short, long)]
  user: Option<String>,

  /// Keep bookings in memory instead of the on-disk database
  #[arg(long)]
  no_persist: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Browse available properties
  Properties {
    /// Narrow the list to names, locations or descriptions matching a query
    #[arg(short, long)]
    query: Option<String>,

    /// Refresh from the server even if the cached list is fresh
    #[arg(long)]
    refresh: bool,
  },
  /// Show one property in full
  Property { id: String },
  /// List your bookings
  Bookings {
    /// Refresh from the server even if the cached list is fresh
    #[arg(long)]
    refresh: bool,
  },
  /// Book a property for a date range
  Book {
    property_id: String,
    /// Check-in date (YYYY-MM-DD)
    #[arg(long)]
    check_in: NaiveDate,
    /// Check-out date (YYYY-MM-DD)
    #[arg(long)]
    check_out: NaiveDate,
    /// Number of guests
    #[arg(long, default_value_t = 1)]
    guests: u32,
  },
  /// Show your profile
  Profile,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let mut config = Config::load(args.config.as_deref())?;

  // Command-line flags win over the config file and environment.
  if let Some(url) = args.base_url {
    config.api.base_url = url;
  }
  if let Some(user) = args.user {
    config.user_id = user;
  }

  let client = if args.no_persist {
    let api = RestApi::new(&config.api.base_url)?;
    CachedClient::with_parts(
      Arc::new(api),
      Box::new(MemoryStorage::new()),
      config.cache.stale_time(),
    )?
  } else {
    CachedClient::new(&config)?
  };

  match args.command {
    Command::Properties { query, refresh } => {
      show_properties(&client, query.as_deref(), refresh).await
    }
    Command::Property { id } => show_property(&client, &id).await,
    Command::Bookings { refresh } => show_bookings(&client, &config.user_id, refresh).await,
    Command::Book {
      property_id,
      check_in,
      check_out,
      guests,
    } => book(&client, &config.user_id, property_id, check_in, check_out, guests).await,
    Command::Profile => show_profile(&client, &config.user_id).await,
  }
}

/// Unwrap a snapshot into its data, or the error that left it empty.
fn resolve<T>(snapshot: QuerySnapshot<T>) -> Result<T> {
  match snapshot.data {
    Some(data) => Ok(data),
    None => Err(
      snapshot
        .error
        .unwrap_or_else(|| Error::remote("request produced no data"))
        .into(),
    ),
  }
}

async fn show_properties(client: &CachedClient, query: Option<&str>, refresh: bool) -> Result<()> {
  let properties = load_properties(client, refresh).await?;
  let shown = filter_properties(&properties, query.unwrap_or(""));

  if shown.is_empty() {
    println!("No properties matched.");
    return Ok(());
  }

  for property in shown {
    println!(
      "{:<4} {:<28} {:<20} ${:>6}/night  rated {:.1}",
      property.id, property.name, property.location, property.price_per_night, property.rating
    );
  }

  Ok(())
}

/// Fetches the full property collection through the cache. Queries are
/// matched locally, so every invocation reads off the same cached list.
async fn load_properties(client: &CachedClient, refresh: bool) -> Result<Vec<Property>> {
  let snapshot = if refresh {
    client.refetch_properties(None).await
  } else {
    client.properties(None).await
  };
  resolve(snapshot)
}

async fn show_property(client: &CachedClient, id: &str) -> Result<()> {
  let property = resolve(client.property(id).await)?;

  println!("{}", property.name);
  println!("{}", property.location);
  println!(
    "${}/night, rated {:.1}",
    property.price_per_night, property.rating
  );
  println!();
  println!("{}", property.description);
  if !property.features.is_empty() {
    println!();
    for feature in &property.features {
      println!("  - {}", feature);
    }
  }

  Ok(())
}

async fn show_bookings(client: &CachedClient, user_id: &str, refresh: bool) -> Result<()> {
  let snapshot = if refresh {
    client.refetch_bookings(user_id).await
  } else {
    client.bookings(user_id).await
  };

  // The local store, placeholders included, is what gets displayed;
  // the query result only drives freshness and errors.
  let entries = client.local_entries();

  if let Some(err) = snapshot.error {
    if entries.is_empty() {
      return Err(err.into());
    }
    eprintln!("warning: could not refresh, showing saved bookings: {err}");
  }

  if entries.is_empty() {
    println!("You haven't booked any properties yet.");
    return Ok(());
  }

  let names = futures::future::join_all(
    entries
      .iter()
      .map(|entry| client.property(&entry.booking.property_id)),
  )
  .await;

  for (entry, name_snapshot) in entries.iter().zip(names) {
    let booking = &entry.booking;
    let name = name_snapshot
      .data
      .map(|p| p.name)
      .unwrap_or_else(|| format!("property {}", booking.property_id));
    let id = if entry.is_pending() {
      "(syncing)".to_string()
    } else {
      format!("#{}", booking.id)
    };
    println!(
      "{:<10} {:<28} {} to {}  ${:>8.2}  {}",
      id, name, booking.start_date, booking.end_date, booking.total_price, booking.status
    );
  }

  Ok(())
}

async fn book(
  client: &CachedClient,
  user_id: &str,
  property_id: String,
  check_in: NaiveDate,
  check_out: NaiveDate,
  guests: u32,
) -> Result<()> {
  let property = resolve(client.property(&property_id).await)?;
  let total = quote_total(property.price_per_night, check_in, check_out);

  let draft = BookingDraft {
    property_id,
    user_id: user_id.to_string(),
    start_date: check_in,
    end_date: check_out,
    guests,
    total_price: total,
  };

  let booking = client.book(&draft).await?;

  println!(
    "Booked {} from {} to {} for ${:.2} (booking #{})",
    property.name, booking.start_date, booking.end_date, booking.total_price, booking.id
  );

  Ok(())
}

async fn show_profile(client: &CachedClient, user_id: &str) -> Result<()> {
  let snapshot = client.user(user_id).await;

  // Fall back to the guest profile when the remote one is unavailable.
  let user = match snapshot.data {
    Some(user) => user,
    None => {
      if let Some(err) = snapshot.error {
        eprintln!("warning: could not load your profile: {err}");
      }
      User::guest()
    }
  };

  println!("{} <{}>", user.name, user.email);
  if let Some(avatar) = &user.avatar {
    println!("avatar: {}", avatar);
  }

  Ok(())
}
