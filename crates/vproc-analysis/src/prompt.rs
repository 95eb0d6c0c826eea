//! Prompt sent with every analysis request.

/// Extract reusable step-by-step instructions from a screen-recorded tutorial.
pub const VIDEO_ANALYSIS_PROMPT: &str = "This is a tutorial video of a user doing actions on their computer. \
Your task is to extract the steps and instructions from the video and output them in a structured format. \
Make sure to include all the steps and instructions from the video so new interns can follow the tasks and do the same thing.

IMPORTANT: Don't hardcode every single value. For example, if the user opens a file named expenses2025.txt, \
don't write the file name as expenses2025.txt. Instead describe the step, for example \"open the appropriate file\".";
