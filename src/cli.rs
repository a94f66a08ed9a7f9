use clap::Parser;
use std::path::PathBuf;

/// PixelPeek - a small desktop image viewer
#[derive(Parser, Debug)]
#[command(name = "pixelpeek")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image file to open at startup
    #[arg(value_name = "IMAGE")]
    pub image: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_optional_image_path() {
        let args = Args::try_parse_from(["pixelpeek"]).unwrap();
        assert!(args.image.is_none());

        let args = Args::try_parse_from(["pixelpeek", "photo.jpg"]).unwrap();
        assert_eq!(args.image, Some(PathBuf::from("photo.jpg")));
    }

    #[test]
    fn rejects_extra_positionals() {
        assert!(Args::try_parse_from(["pixelpeek", "a.jpg", "b.jpg"]).is_err());
    }
}
