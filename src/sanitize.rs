/// Characters that are rejected in file names on at least one common file system.
pub const ILLEGAL_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Removes every character that is illegal in a file name from a video title.
///
/// ```
/// # use ytdownhub::sanitize::sanitize_filename;
/// assert_eq!(sanitize_filename("My:Video?.mp4"), "MyVideo.mp4");
/// ```
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect()
}
