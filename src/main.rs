use anyhow::{bail, Context};

use movie_shelf::models::{Page, Stars};
use movie_shelf::{App, AppError, BrowseResult, Config};

const USAGE: &str = "usage:
  movie-shelf search <term...> [--page N] [--user ID]
  movie-shelf rate <movie_id> <stars> [--user ID]
  movie-shelf rated [--page N] [--user ID]";

#[derive(Debug, PartialEq)]
enum Command {
    Search { term: String },
    Rate { movie_id: i64, stars: Stars },
    Rated,
}

#[derive(Debug, PartialEq)]
struct Args {
    command: Command,
    page: u32,
    user: Option<i64>,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mut positional = Vec::new();
    let mut page: u32 = 1;
    let mut user = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--page" => {
                let value = iter.next().context("--page needs a value")?;
                page = value.parse().with_context(|| format!("invalid page {value:?}"))?;
            }
            "--user" => {
                let value = iter.next().context("--user needs a value")?;
                user = Some(value.parse().with_context(|| format!("invalid user id {value:?}"))?);
            }
            _ => positional.push(arg.as_str()),
        }
    }

    let command = match positional.split_first() {
        Some((&"search", rest)) if !rest.is_empty() => Command::Search {
            term: rest.join(" "),
        },
        Some((&"rate", [movie_id, stars])) => Command::Rate {
            movie_id: movie_id
                .parse()
                .with_context(|| format!("invalid movie id {movie_id:?}"))?,
            stars: stars.parse()?,
        },
        Some((&"rated", [])) => Command::Rated,
        _ => bail!("{USAGE}"),
    };

    Ok(Args {
        command,
        page: page.max(1),
        user,
    })
}

fn print_result(result: &BrowseResult) {
    if let Some(message) = result.error_message {
        println!("{message}");
        return;
    }

    for card in &result.cards.items {
        let stars: String = (1..=Stars::MAX)
            .map(|i| if i <= card.current_user_rating { '★' } else { '☆' })
            .collect();
        let released = card
            .movie
            .release_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "–".to_string());

        println!(
            "[{}] {} ({})  {} {:.1}/5",
            card.movie.id, card.movie.title, released, stars, card.average_rating
        );
        if let Some(overview) = &card.movie.overview {
            println!("    {overview}");
        }
    }

    println!("{}", page_footer(&result.cards));
}

fn page_footer<T>(page: &Page<T>) -> String {
    let mut footer = format!(
        "Page {} of {} ({} movies)",
        page.page,
        page.last_page(),
        page.total
    );
    if page.has_more() {
        footer.push_str(&format!(", next: --page {}", page.page + 1));
    }
    footer
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let config = Config::load()?;
    if config.tmdb.api_key.is_empty() {
        tracing::warn!(
            "No TMDB API key configured (set tmdb.api_key in {:?} or TMDB_API_KEY)",
            Config::config_path()
        );
    }

    let user_id = args.user.unwrap_or(config.user_id);
    let app = App::new(&config).await?;
    app.repository.ensure_user(user_id).await?;

    match args.command {
        Command::Search { term } => {
            let result = app.browse(user_id, &term, args.page).await?;
            print_result(&result);
        }
        Command::Rate { movie_id, stars } => {
            if app.repository.get_movie(movie_id).await?.is_none() {
                return Err(AppError::NotFound(format!("movie {movie_id}")).into());
            }
            let stars = app.rate(user_id, movie_id, i64::from(stars.value())).await?;
            println!("Rated movie {movie_id} with {stars}/5");
        }
        Command::Rated => {
            let result = app.browse(user_id, "", args.page).await?;
            print_result(&result);
        }
    }

    Ok(())
}
