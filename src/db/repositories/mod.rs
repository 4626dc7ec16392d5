mod blocks;
mod strokes;
